//! Error types for the jats2site library.
//!
//! Three distinct types reflect three distinct ways a job can go wrong:
//!
//! * [`Jats2SiteError`]: **Fatal**: the job cannot continue (storage is
//!   unreachable, a collaborator command exited non-zero, the workspace could
//!   not be created). Caught once at the top of the orchestrator and recorded
//!   as a generic failure status.
//!
//! * [`Rejection`]: **Terminal, user-facing**: the target is syntactically
//!   invalid, unknown to PMC, not open access, or carries a license outside
//!   the allow-list. Recorded with rich context (citation, license, DOI) so
//!   the status poller can explain exactly why nothing was published.
//!
//! * [`UploadError`]: **Non-fatal**: a single artifact failed to upload.
//!   Stored in [`crate::pipeline::publish::UploadReport`] and counted in the
//!   log record instead of aborting the whole artifact set.

use crate::status::Provenance;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the jats2site library.
#[derive(Debug, Error)]
pub enum Jats2SiteError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The trigger payload is malformed (no message, no target).
    #[error("Bad Request: {0}")]
    BadRequest(String),

    /// A recognised, terminal reason not to publish the target.
    #[error("{0}")]
    Rejected(Rejection),

    // ── Collaborator errors ───────────────────────────────────────────────
    /// Download metadata could not be resolved for a PMC id.
    #[error("No download metadata for '{id}': {reason}")]
    MetadataUnavailable { id: String, reason: String },

    /// The fetch collaborator failed outright (as opposed to producing nothing).
    #[error("Failed to fetch '{target}': {reason}")]
    FetchFailed { target: String, reason: String },

    /// An external conversion/build command could not be started.
    #[error("Failed to run '{program}': {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external conversion/build command exited unsuccessfully.
    #[error("'{program}' exited with {status}\n{stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The project manifest could not be read, parsed or written.
    #[error("Invalid project manifest '{path}': {reason}")]
    Manifest { path: PathBuf, reason: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// A durable-storage operation failed.
    #[error("Storage error for '{key}': {reason}")]
    Storage { key: String, reason: String },

    /// A storage key would escape the bucket (absolute or `..` components).
    #[error("Invalid storage key '{key}'")]
    InvalidKey { key: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Local file-system operation failed.
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Jats2SiteError {
    /// Shorthand for wrapping an [`std::io::Error`] with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Jats2SiteError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn storage(key: impl Into<String>, reason: impl fmt::Display) -> Self {
        Jats2SiteError::Storage {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<Rejection> for Jats2SiteError {
    fn from(r: Rejection) -> Self {
        Jats2SiteError::Rejected(r)
    }
}

/// Machine-readable failure code written to the `error` field of a failure
/// status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Target failed syntactic validation, or the download produced nothing.
    Invalid,
    /// PMC id is not known to PMC.
    NonPmc,
    /// Article exists but is not in the open-access subset.
    NonOa,
    /// License is missing or not on the allow-list.
    NonCc,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            FailureKind::Invalid => "invalid",
            FailureKind::NonPmc => "non-pmc",
            FailureKind::NonOa => "non-oa",
            FailureKind::NonCc => "non-cc",
        };
        f.write_str(code)
    }
}

/// A terminal, recognised reason not to publish a target.
#[derive(Debug, Clone, Error)]
#[error("{message} ({kind})")]
pub struct Rejection {
    pub kind: FailureKind,
    /// Human-readable explanation, written verbatim to the status record.
    pub message: String,
    /// DOI/citation/license/target context shown to the user.
    pub provenance: Provenance,
}

impl Rejection {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provenance: Provenance::default(),
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }
}

/// A non-fatal error for a single uploaded artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum UploadError {
    /// The store refused or failed the upload.
    #[error("Upload of '{key}' failed: {detail}")]
    Rejected { key: String, detail: String },

    /// The build tree could not be read at this entry.
    #[error("Could not read '{path}': {detail}")]
    Unreadable { path: String, detail: String },
}
