//! Scratch directory used while inspecting tarballs.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary directory that is removed on `release()` or drop.
///
/// Removal is best-effort: the OS reclaims anything left behind.
#[derive(Debug)]
pub struct TempWorkspace {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl TempWorkspace {
    /// Provision a fresh temporary directory
    pub async fn acquire() -> io::Result<Self> {
        let dir = tokio::task::spawn_blocking(|| {
            tempfile::Builder::new()
                .prefix("create-otter-app-")
                .tempdir()
        })
        .await
        .map_err(io::Error::other)??;

        tracing::debug!(path = %dir.path().display(), "acquired temporary workspace");
        Ok(Self {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the directory. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                tracing::debug!(path = %self.path.display(), error = %e, "failed to remove temporary workspace");
            }
        }
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        self.release();
    }
}
