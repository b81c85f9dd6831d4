//! Progress-callback trait for in-process job events.
//!
//! The durable status record is what remote pollers see. Callers running the
//! orchestrator in-process (the CLI `run` command, tests, an embedding
//! service) can additionally inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::Orchestrator::with_progress_callback`] and receive the same
//! transitions without reading storage back.
//!
//! # Example
//!
//! ```rust
//! use jats2site::{JobProgressCallback, Stage};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct StageCounter(AtomicUsize);
//!
//! impl JobProgressCallback for StageCounter {
//!     fn on_stage(&self, _stage: Stage, _progress: f64, _message: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::error::UploadError;
use crate::orchestrator::JobOutcome;
use crate::pipeline::Stage;
use std::sync::Arc;

/// Called by the orchestrator as a job moves through the pipeline.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`: one
/// orchestrator may run many jobs concurrently.
pub trait JobProgressCallback: Send + Sync {
    /// Called once the request is accepted and classified.
    fn on_job_start(&self, target: &str, id: &str) {
        let _ = (target, id);
    }

    /// Called after each successful status write.
    ///
    /// # Arguments
    /// * `stage`   : stage just entered
    /// * `progress`: value written to the status record, in `[0, 1]`
    /// * `message` : human-readable status message
    fn on_stage(&self, stage: Stage, progress: f64, message: &str) {
        let _ = (stage, progress, message);
    }

    /// Called for every artifact that failed to upload (non-fatal).
    fn on_upload_error(&self, error: &UploadError) {
        let _ = error;
    }

    /// Called exactly once per request, whatever the outcome.
    fn on_job_complete(&self, outcome: &JobOutcome) {
        let _ = outcome;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type held by the orchestrator.
pub type ProgressCallback = Arc<dyn JobProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<Stage>>,
    }

    impl JobProgressCallback for Recorder {
        fn on_stage(&self, stage: Stage, _progress: f64, _message: &str) {
            self.stages.lock().unwrap().push(stage);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_job_start("PMC1", "PMC1");
        cb.on_stage(Stage::Downloading, 0.08, "PMC1: Downloading data");
        cb.on_upload_error(&UploadError::Rejected {
            key: "k".into(),
            detail: "d".into(),
        });
        cb.on_job_complete(&JobOutcome::Failed { id: "PMC1".into() });
    }

    #[test]
    fn arc_dyn_callback_receives_stages() {
        let rec = Arc::new(Recorder::default());
        let cb: ProgressCallback = rec.clone();
        cb.on_stage(Stage::Downloading, 0.08, "");
        cb.on_stage(Stage::Converting, 0.32, "");
        assert_eq!(
            *rec.stages.lock().unwrap(),
            vec![Stage::Downloading, Stage::Converting]
        );
    }
}
