//! # jats2site
//!
//! Turn a reference to a scholarly article (a PMC id, a DOI, or a URL to
//! JATS XML) into a published static site, one job per trigger.
//!
//! ## Pipeline Overview
//!
//! ```text
//! trigger {target, id?}
//!  │
//!  ├─ 1. Classify   pmc / doi / url / opaque, canonical storage id
//!  ├─ 2. Gate       skip ids whose storage prefix already holds anything
//!  ├─ 3. Eligible   PMC only: open access, license on the allow-list
//!  ├─ 4. Workspace  fresh scratch directory, passed explicitly to every stage
//!  ├─ 5. Pipeline   download → convert → build → upload → finalize
//!  └─ 6. Release    workspace removed on every path, failures recorded
//! ```
//!
//! Progress is published as a single overwritten `status.json` per job under
//! `{folder}/{id}/`, which a front end polls. A `{stem}.log.yml` with stage
//! timings, output sizes and upload counts is written on success.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jats2site::{
//!     Collaborators, FsStore, JatsFetcher, JatsFetcherConfig, MystCli, Orchestrator,
//!     ServiceConfig, TriggerRequest,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder().storage_folder("sites").build()?;
//!     let deps = Collaborators::new(
//!         Arc::new(FsStore::new("/srv/bucket")),
//!         Arc::new(JatsFetcher::new(JatsFetcherConfig::default())?),
//!         Arc::new(MystCli::default()),
//!     );
//!     let orchestrator = Orchestrator::new(config, deps);
//!     let outcome = orchestrator.handle(TriggerRequest::new("PMC10134778")).await;
//!     println!("{}", outcome.response_text());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum router for the Pub/Sub push trigger and status polling |
//! | `cli`    | on      | Enables the `jats2site` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable both when embedding the orchestrator in another service:
//! ```toml
//! jats2site = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod collab;
pub mod config;
pub mod controller;
pub mod eligibility;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod service;
pub mod status;
pub mod storage;
pub mod target;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use collab::{
    ArticleFetcher, DownloadMetadata, FetchOptions, JatsFetcher, JatsFetcherConfig, MystCli,
    MystCommands, ProjectConverter, SiteBuilder,
};
pub use config::{ServiceConfig, ServiceConfigBuilder, DEFAULT_ALLOWED_LICENSES, DEFAULT_SITE_TEMPLATE};
pub use error::{FailureKind, Jats2SiteError, Rejection, UploadError};
pub use metrics::LogRecord;
pub use orchestrator::{Collaborators, JobOutcome, Orchestrator, TriggerRequest};
pub use pipeline::Stage;
pub use progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback};
pub use status::{poll_view, JobState, Provenance, StatusRecord};
pub use storage::{FsStore, MemoryStore, ObjectStore};
pub use target::{classify, ClassifiedTarget, TargetKind};
