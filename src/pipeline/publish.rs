//! Upload stage: mirror the site output tree into the job's storage prefix.
//!
//! Upload is best effort per file. A file that cannot be read or stored is
//! logged, recorded in the [`UploadReport`], and skipped; the remaining files
//! still go up.

use crate::error::{Jats2SiteError, UploadError};
use crate::storage::ObjectStore;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Outcome of a bulk upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: usize,
    pub failures: Vec<UploadError>,
}

impl UploadReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Fold a single upload attempt into the report.
    pub fn record(&mut self, result: Result<(), UploadError>) {
        match result {
            Ok(()) => self.uploaded += 1,
            Err(e) => {
                warn!("Upload failed: {}", e);
                self.failures.push(e);
            }
        }
    }
}

/// Regular files under `root` with their `/`-joined relative paths.
///
/// Depth first; within each directory, subdirectories come before files and
/// each group is sorted by name.
pub async fn collect_files(root: &Path) -> Result<Vec<(PathBuf, String)>, Jats2SiteError> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        if !root.is_dir() {
            return Err(Jats2SiteError::io(
                &root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "site output missing"),
            ));
        }
        let mut files = Vec::new();
        let walk = WalkDir::new(&root).sort_by(|a, b| {
            b.file_type()
                .is_dir()
                .cmp(&a.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        });
        for entry in walk {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push((entry.into_path(), key));
        }
        Ok(files)
    })
    .await
    .map_err(|e| Jats2SiteError::Internal(format!("walk task failed: {e}")))?
}

/// Upload one file, converting a failure into an [`UploadError`].
pub async fn upload_one(store: &dyn ObjectStore, local: &Path, key: &str) -> Result<(), UploadError> {
    store.upload(local, key).await.map_err(|e| match e {
        Jats2SiteError::Io { path, source } => UploadError::Unreadable {
            path: path.display().to_string(),
            detail: source.to_string(),
        },
        other => UploadError::Rejected {
            key: key.to_string(),
            detail: other.to_string(),
        },
    })
}

/// Upload every regular file under `root` to `{prefix}{relative path}`.
///
/// Only a missing or unwalkable `root` is an error.
pub async fn upload_tree(
    store: &dyn ObjectStore,
    root: &Path,
    prefix: &str,
) -> Result<UploadReport, Jats2SiteError> {
    let mut report = UploadReport::default();
    for (local, rel) in collect_files(root).await? {
        let key = format!("{prefix}{rel}");
        debug!("Uploading {} -> {}", local.display(), key);
        report.record(upload_one(store, &local, &key).await);
    }
    Ok(report)
}
