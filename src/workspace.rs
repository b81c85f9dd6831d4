//! Per-job scratch directories.
//!
//! A [`Workspace`] is an empty directory created for one job and removed
//! before the job ends. Every stage receives its root explicitly; the process
//! working directory is never changed, so any number of jobs can be active in
//! one process without trampling each other's relative paths.
//!
//! Release is explicit ([`Workspace::release`]) so the orchestrator can log
//! a failed cleanup, and also guaranteed: the backing [`TempDir`] deletes the
//! directory on drop, covering early returns and panics.

use crate::error::Jats2SiteError;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, info};

const WORKSPACE_PREFIX: &str = "jats";

/// An exclusively owned, ephemeral job directory.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a uniquely named empty directory under `scratch_root`.
    ///
    /// The scratch root is created if it does not exist yet.
    pub async fn acquire(scratch_root: &Path) -> Result<Self, Jats2SiteError> {
        let root = scratch_root.to_path_buf();
        let dir = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&root).map_err(|e| Jats2SiteError::io(&root, e))?;
            tempfile::Builder::new()
                .prefix(WORKSPACE_PREFIX)
                .tempdir_in(&root)
                .map_err(|e| Jats2SiteError::io(&root, e))
        })
        .await
        .map_err(|e| Jats2SiteError::Internal(format!("workspace task: {e}")))??;
        info!("Working in temp folder: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Recursively delete the workspace off the async worker threads.
    ///
    /// A directory that has already disappeared counts as released.
    pub async fn release(self) -> Result<(), Jats2SiteError> {
        let path = self.dir.path().to_path_buf();
        let dir = self.dir;
        let closed = tokio::task::spawn_blocking(move || dir.close())
            .await
            .map_err(|e| Jats2SiteError::Internal(format!("workspace task: {e}")))?;
        match closed {
            Ok(()) => {
                debug!("Removed workspace {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Jats2SiteError::io(path, e)),
        }
    }
}
