//! External package manager invocation

use crate::reference::PackageReference;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Package manager flavour, which decides the install argument set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerKind {
    #[default]
    Npm,
    Yarn,
}

impl PackageManagerKind {
    pub fn default_program(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarnpkg",
        }
    }

    fn install_args(&self, verbose: bool) -> Vec<String> {
        let mut args: Vec<String> = match self {
            Self::Npm => ["install", "--save", "--save-exact", "--loglevel", "error"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            Self::Yarn => vec!["add".to_string(), "--exact".to_string()],
        };
        if verbose {
            args.push("--verbose".to_string());
        }
        args
    }
}

/// Runs the package manager against a project root
#[derive(Debug, Clone)]
pub struct Installer {
    kind: PackageManagerKind,
    program: String,
    inherit_output: bool,
}

impl Installer {
    pub fn new(kind: PackageManagerKind) -> Self {
        Self::with_program(kind, kind.default_program())
    }

    /// Use a specific executable instead of the flavour's default
    pub fn with_program(kind: PackageManagerKind, program: impl Into<String>) -> Self {
        Self {
            kind,
            program: program.into(),
            inherit_output: true,
        }
    }

    /// Discard the package manager's stdout/stderr
    pub fn silent(mut self) -> Self {
        self.inherit_output = false;
        self
    }

    pub fn kind(&self) -> PackageManagerKind {
        self.kind
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument vector (program first) for installing `references`
    pub fn command_line(&self, references: &[PackageReference], verbose: bool) -> Vec<String> {
        let mut line = vec![self.program.clone()];
        line.extend(self.kind.install_args(verbose));
        line.extend(references.iter().map(PackageReference::as_install_arg));
        line
    }

    /// Install `references` into `root`, recording them in its manifest.
    ///
    /// The manifest must already exist in `root`.
    pub async fn install(
        &self,
        root: &Path,
        references: &[PackageReference],
        verbose: bool,
    ) -> Result<(), InstallError> {
        let line = self.command_line(references, verbose);
        let command = line.join(" ");
        tracing::debug!(%command, root = %root.display(), "spawning package manager");

        let (stdout, stderr) = if self.inherit_output {
            (Stdio::inherit(), Stdio::inherit())
        } else {
            (Stdio::null(), Stdio::null())
        };

        let status = Command::new(&line[0])
            .args(&line[1..])
            .current_dir(root)
            .stdin(Stdio::inherit())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .await
            .map_err(|e| InstallError::Spawn {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !status.success() {
            tracing::debug!(%command, code = ?status.code(), "package manager failed");
            return Err(InstallError::Failed { command });
        }

        Ok(())
    }
}

impl Default for Installer {
    fn default() -> Self {
        Self::new(PackageManagerKind::default())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("Command failed: {command}")]
    Failed { command: String },

    #[error("Failed to run `{command}`: {message}")]
    Spawn { command: String, message: String },
}

impl InstallError {
    /// The command line that was invoked
    pub fn command(&self) -> &str {
        match self {
            Self::Failed { command } | Self::Spawn { command, .. } => command,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::resolve;
    use tempfile::TempDir;

    fn references() -> Vec<PackageReference> {
        vec![
            resolve("otter-scripts", Some("1.0.0"), Path::new("/")),
            PackageReference::RawPassthrough("extra-pkg".to_string()),
        ]
    }

    #[test]
    fn test_npm_command_line() {
        let installer = Installer::default();
        assert_eq!(
            installer.command_line(&references(), false).join(" "),
            "npm install --save --save-exact --loglevel error otter-scripts@1.0.0 extra-pkg"
        );
        assert_eq!(
            installer.command_line(&references(), true).join(" "),
            "npm install --save --save-exact --loglevel error --verbose otter-scripts@1.0.0 extra-pkg"
        );
    }

    #[test]
    fn test_yarn_command_line() {
        let installer = Installer::new(PackageManagerKind::Yarn);
        assert_eq!(
            installer.command_line(&references(), true).join(" "),
            "yarnpkg add --exact --verbose otter-scripts@1.0.0 extra-pkg"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_reports_command() {
        let dir = TempDir::new().unwrap();
        let installer = Installer::with_program(PackageManagerKind::Npm, "false").silent();

        let err = installer
            .install(dir.path(), &references(), false)
            .await
            .unwrap_err();
        match err {
            InstallError::Failed { command } => assert_eq!(
                command,
                "false install --save --save-exact --loglevel error otter-scripts@1.0.0 extra-pkg"
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_succeeds() {
        let dir = TempDir::new().unwrap();
        let installer = Installer::with_program(PackageManagerKind::Npm, "true").silent();
        installer
            .install(dir.path(), &references(), true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let installer =
            Installer::with_program(PackageManagerKind::Npm, "otter-no-such-package-manager")
                .silent();
        let err = installer
            .install(dir.path(), &references(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Spawn { .. }));
        assert!(err.command().starts_with("otter-no-such-package-manager install"));
    }

    #[test]
    fn test_kind_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: PackageManagerKind,
        }
        let w: Wrapper = serde_json::from_str(r#"{ "kind": "yarn" }"#).unwrap();
        assert_eq!(w.kind, PackageManagerKind::Yarn);
    }
}
