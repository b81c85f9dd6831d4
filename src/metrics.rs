//! Per-job timing and size metrics, written once on success.
//!
//! The converter may already have left a `{stem}.log.yml` in the workspace;
//! the [`LogRecord`] fields are merged into it rather than replacing it.

use crate::error::Jats2SiteError;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use std::time::Instant;
use walkdir::WalkDir;

/// Stage durations in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimes {
    pub download: f64,
    /// Convert plus build.
    pub process: f64,
    pub upload: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSizes {
    /// Archive byte size, if the fetch produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<u64>,
    /// Total byte size of the build root.
    pub build: u64,
}

/// Aggregate of the best-effort bulk upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCounts {
    pub uploaded: usize,
    pub failed: usize,
}

/// The durable per-job log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// RFC 2822, UTC.
    pub date: String,
    pub times: StageTimes,
    pub sizes: OutputSizes,
    pub uploads: UploadCounts,
}

impl LogRecord {
    pub fn new(times: StageTimes, sizes: OutputSizes, uploads: UploadCounts) -> Self {
        Self {
            date: chrono::Utc::now().to_rfc2822(),
            times,
            sizes,
            uploads,
        }
    }
}

/// Measures consecutive phases of one job.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    last: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous lap (or start), then restart.
    pub fn lap(&mut self) -> f64 {
        let now = Instant::now();
        let secs = now.duration_since(self.last).as_secs_f64();
        self.last = now;
        secs
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::start()
    }
}

/// Recursive byte size of regular files under `dir`; 0 if it is missing.
pub async fn dir_size(dir: &Path) -> Result<u64, Jats2SiteError> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        WalkDir::new(&dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum::<u64>()
    })
    .await
    .map_err(|e| Jats2SiteError::Internal(format!("size task: {e}")))
}

/// Size of the first `.tar.gz` or `.meca` file at the workspace root.
pub async fn find_archive(workspace: &Path) -> Result<Option<u64>, Jats2SiteError> {
    let workspace = workspace.to_path_buf();
    tokio::task::spawn_blocking(move || archive_size(&workspace))
        .await
        .map_err(|e| Jats2SiteError::Internal(format!("archive task: {e}")))
}

fn archive_size(workspace: &Path) -> Option<u64> {
    let mut names: Vec<_> = std::fs::read_dir(workspace)
        .ok()?
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| {
            let name = p
                .file_name()
                .map(|n| n.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default();
            name.ends_with(".tar.gz") || name.ends_with(".meca")
        })
        .collect();
    names.sort();
    let first = names.first()?;
    std::fs::metadata(first).ok().map(|m| m.len())
}

/// Merge `record` into the YAML mapping at `path`, creating it if needed.
pub async fn write_log(path: &Path, record: &LogRecord) -> Result<(), Jats2SiteError> {
    let yaml_err = |e: serde_yaml::Error| Jats2SiteError::Internal(format!("log record: {e}"));

    let mut merged = match tokio::fs::read_to_string(path).await {
        Ok(text) => match serde_yaml::from_str::<Value>(&text) {
            Ok(Value::Mapping(m)) => m,
            Ok(_) | Err(_) => Mapping::new(),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Mapping::new(),
        Err(e) => return Err(Jats2SiteError::io(path, e)),
    };

    let fields = serde_yaml::to_value(record).map_err(yaml_err)?;
    if let Value::Mapping(fields) = fields {
        for (k, v) in fields {
            merged.insert(k, v);
        }
    }

    let text = serde_yaml::to_string(&Value::Mapping(merged)).map_err(yaml_err)?;
    tokio::fs::write(path, text)
        .await
        .map_err(|e| Jats2SiteError::io(path, e))
}
