//! Project bootstrap pipeline.
//!
//! guard -> manifest -> resolve -> name -> install -> initializer.
//! A failure between writing the manifest and locating the initializer rolls
//! the project directory back to what it was before the run.

use crate::app_name::{NameError, validate_app_name};
use crate::engines::check_engine;
use crate::guard::{GuardError, ensure_clean};
use crate::initializer::{self, DEFAULT_ENTRY, DEPENDENCY_DIR, InitContext, Initializer, InitializerError};
use crate::installer::{InstallError, Installer};
use crate::manifest::{MANIFEST_FILE, ManifestError, ProjectManifest};
use crate::package_name::{ExtractError, NameExtractor};
use crate::progress::Progress;
use crate::reference::{self, absolutize};
use std::path::{Path, PathBuf};

/// Files the pipeline may have generated before failing
const GENERATED_FILES: &[&str] = &[MANIFEST_FILE, "package-lock.json", "yarn.lock", DEPENDENCY_DIR];

/// Settings that do not change between runs
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Registry name of the scripts package
    pub scripts_package: String,
    pub installer: Installer,
    /// Initializer entry relative to the installed package
    pub initializer_entry: PathBuf,
    /// Runtime whose version is checked against the package's `engines`
    pub engine_runtime: Option<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            scripts_package: "otter-scripts".to_string(),
            installer: Installer::default(),
            initializer_entry: PathBuf::from(DEFAULT_ENTRY),
            engine_runtime: Some("node".to_string()),
        }
    }
}

/// Parsed command-line input for one run
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Project directory, relative to `original_cwd` or absolute
    pub project: String,
    pub verbose: bool,
    pub scripts_version: Option<String>,
    pub original_cwd: PathBuf,
}

/// What a rollback removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackOutcome {
    /// Generated entries that were deleted
    pub removed: Vec<String>,
    /// Whether the project root itself was deleted
    pub removed_root: bool,
    /// Directory to continue from: the root, or its parent once removed
    pub working_dir: PathBuf,
}

/// Runs the bootstrap pipeline
pub struct Bootstrap<I> {
    config: BootstrapConfig,
    initializer: I,
    progress: Progress,
    last_rollback: Option<RollbackOutcome>,
}

impl<I: Initializer> Bootstrap<I> {
    pub fn new(config: BootstrapConfig, initializer: I, progress: Progress) -> Self {
        Self {
            config,
            initializer,
            progress,
            last_rollback: None,
        }
    }

    /// Rollback performed by the last failed `run`, if any
    pub fn rollback_outcome(&self) -> Option<&RollbackOutcome> {
        self.last_rollback.as_ref()
    }

    /// Create the project and hand it to the initializer.
    ///
    /// Returns the absolute project root.
    pub async fn run(&mut self, options: &BootstrapOptions) -> Result<PathBuf, BootstrapError> {
        self.last_rollback = None;

        let root = absolutize(&options.original_cwd, Path::new(&options.project));
        let app_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        validate_app_name(&app_name, &self.config.scripts_package)?;

        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| BootstrapError::io(&root, e))?;

        let check = ensure_clean(&root, &app_name, &self.progress).await?;
        if !check.is_clean() {
            return Err(BootstrapError::Conflict {
                root,
                conflicts: check.conflicts,
            });
        }

        self.progress.creating(&app_name, &root);

        let (package_name, entry) = match self.install_scripts(&root, &app_name, options).await {
            Ok(installed) => installed,
            Err(e) if e.is_rollback_trigger() => {
                self.last_rollback = Some(self.rollback(&root, &app_name, &e).await);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        tracing::info!(package = %package_name, entry = %entry.display(), "handing off to initializer");
        let ctx = InitContext {
            entry: &entry,
            root: &root,
            app_name: &app_name,
            verbose: options.verbose,
            original_cwd: &options.original_cwd,
        };
        self.initializer.invoke(&ctx).await?;

        self.progress.success(&app_name, &root);
        Ok(root)
    }

    /// Manifest, resolution, name extraction, install and initializer lookup
    async fn install_scripts(
        &mut self,
        root: &Path,
        app_name: &str,
        options: &BootstrapOptions,
    ) -> Result<(String, PathBuf), BootstrapError> {
        ProjectManifest::new(app_name).write(root).await?;

        let reference = reference::resolve(
            &self.config.scripts_package,
            options.scripts_version.as_deref(),
            &options.original_cwd,
        );

        let extractor = NameExtractor::new(&options.original_cwd);
        let package_name = extractor.extract(&reference, &mut self.progress).await?;
        tracing::debug!(%reference, package = %package_name, "scripts package identified");

        let plan = vec![reference];
        let display: Vec<String> = plan.iter().map(|r| r.as_install_arg()).collect();
        self.progress.installing(&display);
        self.config
            .installer
            .install(root, &plan, options.verbose)
            .await?;

        if let Some(runtime) = &self.config.engine_runtime {
            check_engine(root, &package_name, runtime, &self.progress).await;
        }

        let entry = initializer::locate(root, &package_name, &self.config.initializer_entry).await?;
        Ok((package_name, entry))
    }

    /// Remove generated files; remove `root` too if nothing else is left
    pub async fn rollback(
        &self,
        root: &Path,
        app_name: &str,
        error: &BootstrapError,
    ) -> RollbackOutcome {
        let reason = match error.command() {
            Some(command) => format!("{} has failed.", command),
            None => format!("Unexpected error. Please report it as a bug:\n{}", error),
        };
        self.progress.rollback_start(&reason);
        tracing::debug!(root = %root.display(), "rolling back");

        let mut removed = Vec::new();
        for file in GENERATED_FILES {
            let path = root.join(file);
            let Ok(meta) = tokio::fs::symlink_metadata(&path).await else {
                continue;
            };
            self.progress.deleting(file, root);
            let result = if meta.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            match result {
                Ok(()) => removed.push(file.to_string()),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to delete generated file"),
            }
        }

        let parent = root.parent().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
        let mut removed_root = false;
        if is_empty_dir(root).await {
            self.progress.deleting(&format!("{}/", app_name), &parent);
            match tokio::fs::remove_dir(root).await {
                Ok(()) => removed_root = true,
                Err(e) => tracing::warn!(root = %root.display(), error = %e, "failed to delete project directory"),
            }
        }
        self.progress.rollback_done();

        RollbackOutcome {
            removed,
            removed_root,
            working_dir: if removed_root { parent } else { root.to_path_buf() },
        }
    }
}

async fn is_empty_dir(dir: &Path) -> bool {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    InvalidName(#[from] NameError),

    #[error("The directory {root} contains files that could conflict: {}", .conflicts.join(", "))]
    Conflict { root: PathBuf, conflicts: Vec<String> },

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Initializer(#[from] InitializerError),

    #[error("IO error on {path}: {message}")]
    Io { path: PathBuf, message: String },
}

impl BootstrapError {
    fn io(path: &Path, e: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    }

    /// The failing command line, for failures that carry one
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Install(InstallError::Failed { command }) => Some(command),
            _ => None,
        }
    }

    /// Failures that leave generated files behind and need a rollback
    pub fn is_rollback_trigger(&self) -> bool {
        matches!(
            self,
            Self::Manifest(_)
                | Self::Extract(_)
                | Self::Install(_)
                | Self::Initializer(InitializerError::NotFound { .. })
        )
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Initializer(InitializerError::Exited { code, .. }) => *code,
            _ => 1,
        }
    }
}
