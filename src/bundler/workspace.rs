//! Temporary workspace owned by a single packaging run.
//!
//! The workspace is removed when the [`Workspace`] value is dropped, which
//! happens on success, on `?` propagation, during panic unwinding, and when
//! the pipeline future is dropped mid-run. Removal failures are logged and
//! never replace the run's own result.

use crate::bundler::error::{ErrorExt, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Prefix of workspace directory names under the system temp directory.
pub const WORKSPACE_PREFIX: &str = "packager-";

/// RAII guard for the per-run temporary directory.
///
/// Layout:
///
/// ```text
/// packager-XXXXXX/
/// ├── download/   runtime archive and its extracted tree
/// └── stage/      bundle layout before packaging
/// ```
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Creates a uniquely-named workspace under the system temp directory.
    pub fn create() -> Result<Self> {
        Self::create_in(std::env::temp_dir())
    }

    /// Creates a uniquely-named workspace under `parent`.
    pub fn create_in(parent: impl AsRef<Path>) -> Result<Self> {
        let parent = parent.as_ref();
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent)
            .fs_context("creating workspace in", parent)?;
        let path = dir.path().to_path_buf();

        log::info!("Working in {}", path.display());

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    /// Root of the workspace.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory receiving the runtime archive and its extracted contents.
    pub fn download_dir(&self) -> PathBuf {
        self.path.join("download")
    }

    /// Directory holding staged bundles.
    pub fn stage_dir(&self) -> PathBuf {
        self.path.join("stage")
    }

    /// Disables removal and returns the workspace path.
    ///
    /// Used for debugging a failed run; the caller owns the directory afterwards.
    pub fn keep(mut self) -> PathBuf {
        if let Some(dir) = self.dir.take() {
            let _ = dir.keep();
        }
        log::info!("Keeping workspace {}", self.path.display());
        self.path.clone()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        log::info!("Cleaning up");
        if let Err(e) = dir.close() {
            log::warn!(
                "Failed to remove workspace {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
