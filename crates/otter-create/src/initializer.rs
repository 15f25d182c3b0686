//! Initializer handoff.
//!
//! Every scripts package ships an entry point at a fixed relative path
//! (`node_modules/<package>/scripts/init.js` by default). Once the package
//! is installed the project is handed to that entry and this crate is done
//! with it.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Directory the package manager installs dependencies into
pub const DEPENDENCY_DIR: &str = "node_modules";

/// Entry point relative to the installed scripts package
pub const DEFAULT_ENTRY: &str = "scripts/init.js";

/// Everything an initializer receives
#[derive(Debug, Clone, Copy)]
pub struct InitContext<'a> {
    /// Located entry point inside the installed package
    pub entry: &'a Path,
    /// Absolute project root
    pub root: &'a Path,
    pub app_name: &'a str,
    pub verbose: bool,
    /// Working directory the tool was started from
    pub original_cwd: &'a Path,
}

/// The contract an installed scripts package fulfils
pub trait Initializer {
    fn invoke(
        &self,
        ctx: &InitContext<'_>,
    ) -> impl Future<Output = Result<(), InitializerError>> + Send;
}

/// `<root>/node_modules/<package>/<entry>`
pub fn entry_path(root: &Path, package_name: &str, entry: &Path) -> PathBuf {
    root.join(DEPENDENCY_DIR).join(package_name).join(entry)
}

/// Find the initializer entry of an installed package
pub async fn locate(
    root: &Path,
    package_name: &str,
    entry: &Path,
) -> Result<PathBuf, InitializerError> {
    let path = entry_path(root, package_name, entry);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        _ => Err(InitializerError::NotFound {
            package: package_name.to_string(),
            path,
        }),
    }
}

/// Runs the entry with a script runtime as a child process:
/// `<runtime> <entry> <root> <appName> <verbose> <originalCwd>`
#[derive(Debug, Clone)]
pub struct ScriptInitializer {
    runtime: String,
}

impl ScriptInitializer {
    pub fn new(runtime: impl Into<String>) -> Self {
        Self {
            runtime: runtime.into(),
        }
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    fn command_line(&self, ctx: &InitContext<'_>) -> Vec<String> {
        vec![
            self.runtime.clone(),
            ctx.entry.display().to_string(),
            ctx.root.display().to_string(),
            ctx.app_name.to_string(),
            ctx.verbose.to_string(),
            ctx.original_cwd.display().to_string(),
        ]
    }
}

impl Default for ScriptInitializer {
    fn default() -> Self {
        Self::new("node")
    }
}

impl Initializer for ScriptInitializer {
    async fn invoke(&self, ctx: &InitContext<'_>) -> Result<(), InitializerError> {
        let line = self.command_line(ctx);
        let command = line.join(" ");
        tracing::debug!(%command, "invoking initializer");

        let status = Command::new(&line[0])
            .args(&line[1..])
            .current_dir(ctx.root)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| InitializerError::Spawn {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(InitializerError::Exited {
                command,
                code: status.code().unwrap_or(1),
            });
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitializerError {
    #[error("Could not find the initializer for {package} at {path}")]
    NotFound { package: String, path: PathBuf },

    #[error("Failed to run `{command}`: {message}")]
    Spawn { command: String, message: String },

    #[error("Initializer `{command}` exited with code {code}")]
    Exited { command: String, code: i32 },
}
