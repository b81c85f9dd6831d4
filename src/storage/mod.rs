//! Durable object storage.
//!
//! Every job writes under a flat key namespace `{folder}/{id}/…`. The
//! orchestrator only needs four verbs: an existence check on a prefix, a
//! local-file upload, an in-memory put (status and log records), and a read
//! (status polling).
//!
//! * [`FsStore`] maps keys onto a directory tree: a local bucket, or a
//!   mounted one (gcsfuse, s3fs).
//! * [`MemoryStore`] keeps objects in process and records every write, which
//!   makes it the store of choice for tests and dry runs.

pub mod fs;
pub mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use crate::error::Jats2SiteError;
use async_trait::async_trait;
use std::path::Path;

/// The durable-storage collaborator.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `true` if at least one object key starts with `prefix`.
    async fn exists(&self, prefix: &str) -> Result<bool, Jats2SiteError>;

    /// Copy the local file at `local` to `key`, replacing any existing object.
    async fn upload(&self, local: &Path, key: &str) -> Result<(), Jats2SiteError>;

    /// Write `bytes` to `key`, replacing any existing object.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), Jats2SiteError>;

    /// Read the object at `key`, `None` if it does not exist.
    async fn download(&self, key: &str) -> Result<Option<Vec<u8>>, Jats2SiteError>;
}

/// Reject keys that could escape the bucket root.
pub fn validate_key(key: &str) -> Result<(), Jats2SiteError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg == ".." || seg == ".");
    if bad {
        return Err(Jats2SiteError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}
