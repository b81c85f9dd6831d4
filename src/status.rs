//! Durable, overwritten-in-place job status.
//!
//! Each job owns exactly one object, `{prefix}status.json`, which external
//! pollers read to animate a progress screen. The record is a tagged union on
//! `status`: each variant declares exactly the fields that are legal for it,
//! while optional provenance (target, DOI, citation, license) rides alongside.
//!
//! [`StatusReporter`] is the only writer. It enforces the two invariants the
//! poller relies on: progress never goes backwards, and nothing is written
//! after a terminal record.

use crate::error::{FailureKind, Jats2SiteError, Rejection};
use crate::pipeline::Stage;
use crate::storage::ObjectStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Object name of the status record under a job prefix.
pub const STATUS_FILE: &str = "status.json";

/// Where an article came from, as far as the user is concerned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

impl Provenance {
    pub fn for_target(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }
}

/// The `status`-tagged part of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobState {
    Processing {
        progress: f64,
    },
    Success {
        progress: f64,
    },
    Failure {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<FailureKind>,
    },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Processing { .. })
    }

    pub fn progress(&self) -> Option<f64> {
        match self {
            JobState::Processing { progress } | JobState::Success { progress } => Some(*progress),
            JobState::Failure { .. } => None,
        }
    }
}

/// One status record as stored in `status.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Write time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub message: String,
    #[serde(flatten)]
    pub state: JobState,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl StatusRecord {
    pub fn new(state: JobState, message: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            message: message.into(),
            state,
            provenance,
        }
    }
}

/// What a poller sees: the stored record, or `{status: "none", progress: 0}`.
pub fn poll_view(record: Option<&StatusRecord>) -> serde_json::Value {
    match record {
        Some(r) => serde_json::to_value(r).unwrap_or_else(|_| none_view()),
        None => none_view(),
    }
}

fn none_view() -> serde_json::Value {
    serde_json::json!({ "status": "none", "progress": 0 })
}

/// Read the current status record for a job prefix.
pub async fn read_status(
    store: &dyn ObjectStore,
    prefix: &str,
) -> Result<Option<StatusRecord>, Jats2SiteError> {
    let key = format!("{prefix}{STATUS_FILE}");
    match store.download(&key).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Jats2SiteError::storage(key, format!("unreadable status: {e}"))),
        None => Ok(None),
    }
}

/// Single writer of one job's status record.
pub struct StatusReporter {
    store: Arc<dyn ObjectStore>,
    key: String,
    /// Provenance stamped onto processing and success records.
    provenance: Provenance,
    last_progress: f64,
    terminal: bool,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: &str, target: &str) -> Self {
        Self {
            store,
            key: format!("{prefix}{STATUS_FILE}"),
            provenance: Provenance::for_target(target),
            last_progress: 0.0,
            terminal: false,
        }
    }

    /// Carry citation and license into every later processing/success write.
    pub fn set_citation_license(&mut self, citation: Option<String>, license: Option<String>) {
        self.provenance.citation = citation;
        self.provenance.license = license;
    }

    pub fn last_progress(&self) -> f64 {
        self.last_progress
    }

    /// Record that the job has entered `stage`.
    ///
    /// Returns the progress value actually written, clamped so it never
    /// drops below an earlier write.
    pub async fn processing(
        &mut self,
        stage: Stage,
        message: impl Into<String>,
    ) -> Result<f64, Jats2SiteError> {
        let progress = stage.progress().max(self.last_progress);
        let record = StatusRecord::new(
            JobState::Processing { progress },
            message,
            self.provenance.clone(),
        );
        self.write(record).await?;
        Ok(progress)
    }

    pub async fn success(&mut self, message: impl Into<String>) -> Result<(), Jats2SiteError> {
        let record = StatusRecord::new(
            JobState::Success { progress: 1.0 },
            message,
            self.provenance.clone(),
        );
        self.write(record).await
    }

    /// Terminal failure carrying the rejection's own provenance.
    pub async fn reject(&mut self, rejection: &Rejection) -> Result<(), Jats2SiteError> {
        let record = StatusRecord::new(
            JobState::Failure {
                error: Some(rejection.kind),
            },
            rejection.message.clone(),
            rejection.provenance.clone(),
        );
        self.write(record).await
    }

    /// Terminal failure with minimal detail, for internal stage errors.
    pub async fn fail(&mut self, message: impl Into<String>) -> Result<(), Jats2SiteError> {
        let record = StatusRecord::new(
            JobState::Failure { error: None },
            message,
            Provenance::default(),
        );
        self.write(record).await
    }

    async fn write(&mut self, record: StatusRecord) -> Result<(), Jats2SiteError> {
        if self.terminal {
            warn!(
                "Dropping status write after terminal record for {}: {}",
                self.key, record.message
            );
            return Ok(());
        }
        info!("{}", record.message);
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| Jats2SiteError::Internal(format!("status serialisation: {e}")))?;
        self.store.put(&self.key, bytes).await?;
        if let Some(p) = record.state.progress() {
            self.last_progress = p;
        }
        self.terminal = record.state.is_terminal();
        Ok(())
    }
}
