//! Target directory validation before anything is written

use crate::progress::Progress;
use std::path::{Path, PathBuf};

/// Entries that may already exist in a project directory
const BENIGN_ENTRIES: &[&str] = &[
    ".DS_Store",
    ".git",
    ".gitattributes",
    ".gitignore",
    ".gitlab-ci.yml",
    ".hg",
    ".hgcheck",
    ".hgignore",
    ".idea",
    ".npmignore",
    ".travis.yml",
    "docs",
    "LICENSE",
    "README.md",
    "mkdocs.yml",
    "Thumbs.db",
];

/// Leftovers of a previous failed install, removed on sight
const ERROR_LOG_PREFIXES: &[&str] = &["npm-debug.log", "yarn-error.log", "yarn-debug.log"];

/// Result of inspecting a target directory
#[derive(Debug, Default)]
pub struct DirectoryCheck {
    /// Conflicting entries, directories suffixed with `/`, sorted
    pub conflicts: Vec<String>,
    /// Error logs that were deleted
    pub purged: Vec<PathBuf>,
}

impl DirectoryCheck {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

fn is_benign(name: &str) -> bool {
    BENIGN_ENTRIES.contains(&name) || name.ends_with(".iml")
}

fn is_error_log(name: &str) -> bool {
    ERROR_LOG_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// List conflicting entries in `root` and delete stale error logs
pub async fn check_directory(root: &Path) -> Result<DirectoryCheck, GuardError> {
    let io_err = |e: std::io::Error| GuardError::Io {
        path: root.to_path_buf(),
        message: e.to_string(),
    };

    let mut check = DirectoryCheck::default();
    let mut entries = tokio::fs::read_dir(root).await.map_err(io_err)?;

    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();

        if is_error_log(&name) {
            tracing::debug!(path = %path.display(), "removing stale error log");
            let removed = if entry.file_type().await.map_err(io_err)?.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            removed.map_err(|e| GuardError::Io {
                path: path.clone(),
                message: e.to_string(),
            })?;
            check.purged.push(path);
            continue;
        }

        if is_benign(&name) {
            continue;
        }

        let is_dir = entry.file_type().await.map_err(io_err)?.is_dir();
        check
            .conflicts
            .push(if is_dir { format!("{}/", name) } else { name });
    }

    check.conflicts.sort();
    Ok(check)
}

/// Check `root` and print any conflicts under `app_name`.
///
/// A check that is not clean means the caller must abort before writing.
pub async fn ensure_clean(
    root: &Path,
    app_name: &str,
    progress: &Progress,
) -> Result<DirectoryCheck, GuardError> {
    let check = check_directory(root).await?;
    if !check.is_clean() {
        progress.conflicts(app_name, &check.conflicts);
    }
    Ok(check)
}

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("IO error on {path}: {message}")]
    Io { path: PathBuf, message: String },
}
