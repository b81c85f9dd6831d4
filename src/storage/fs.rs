//! Directory-backed object store.

use super::{validate_key, ObjectStore};
use crate::error::Jats2SiteError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Stores each object as a file at `root/<key>`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, Jats2SiteError> {
        validate_key(key)?;
        Ok(self.root.join(key.trim_end_matches('/')))
    }

    async fn ensure_parent(path: &Path) -> Result<(), Jats2SiteError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Jats2SiteError::io(parent, e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn exists(&self, prefix: &str) -> Result<bool, Jats2SiteError> {
        let path = self.resolve(prefix)?;
        let root = path.clone();
        // A prefix may name a directory of objects or a single object.
        tokio::task::spawn_blocking(move || {
            if root.is_file() {
                return true;
            }
            WalkDir::new(&root)
                .into_iter()
                .filter_map(Result::ok)
                .any(|entry| entry.file_type().is_file())
        })
        .await
        .map_err(|e| Jats2SiteError::Internal(format!("exists task: {e}")))
    }

    async fn upload(&self, local: &Path, key: &str) -> Result<(), Jats2SiteError> {
        let dest = self.resolve(key)?;
        Self::ensure_parent(&dest).await?;
        tokio::fs::copy(local, &dest)
            .await
            .map_err(|e| Jats2SiteError::storage(key, format!("{}: {e}", local.display())))?;
        debug!("Uploaded {} -> {}", local.display(), key);
        Ok(())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), Jats2SiteError> {
        let dest = self.resolve(key)?;
        Self::ensure_parent(&dest).await?;

        // Atomic write: pollers never observe a half-written record.
        let tmp = dest.with_extension("part");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| Jats2SiteError::storage(key, e))?;
        tokio::fs::rename(&tmp, &dest)
            .await
            .map_err(|e| Jats2SiteError::storage(key, e))?;
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Option<Vec<u8>>, Jats2SiteError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Jats2SiteError::storage(key, e)),
        }
    }
}
