//! Job entry point: one trigger in, one [`JobOutcome`] out.
//!
//! Order of operations for a request:
//!
//! 1. classify the target and derive the storage prefix
//! 2. stop if the prefix already holds anything
//! 3. screen the target; for PMC ids check eligibility
//! 4. acquire a workspace and run the [`Controller`]
//! 5. release the workspace, then record any failure
//!
//! Nothing here panics on collaborator failure and nothing escapes as an
//! error: every path ends in a [`JobOutcome`] whose
//! [`response_text`](JobOutcome::response_text) is what the trigger caller
//! gets back.

use crate::collab::{ArticleFetcher, ProjectConverter, SiteBuilder};
use crate::config::ServiceConfig;
use crate::controller::Controller;
use crate::eligibility::{self, Eligibility};
use crate::error::{FailureKind, Jats2SiteError, Rejection};
use crate::gate;
use crate::metrics::LogRecord;
use crate::pipeline::Stage;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::status::{self, StatusRecord, StatusReporter};
use crate::storage::{self, ObjectStore};
use crate::target::{classify, ClassifiedTarget, TargetKind};
use crate::workspace::Workspace;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// An inbound trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TriggerRequest {
    /// Input passed to the fetcher.
    #[serde(default)]
    pub target: Option<String>,
    /// Storage key override; defaults to one derived from `target`.
    #[serde(default)]
    pub id: Option<String>,
}

impl TriggerRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// How a request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The trigger payload was unusable; no job was constructed.
    BadRequest(String),
    /// The id's prefix already held artifacts; nothing was done.
    AlreadyProcessed { id: String },
    /// A recognised reason not to publish, recorded in the status.
    Rejected { id: String, kind: FailureKind },
    /// An internal stage failure, recorded as a generic failure status.
    Failed { id: String },
    Succeeded { id: String, log: LogRecord },
}

impl JobOutcome {
    /// Body returned to the trigger caller alongside the fixed status code.
    pub fn response_text(&self) -> String {
        match self {
            JobOutcome::BadRequest(msg) => format!("Bad Request: {msg}"),
            JobOutcome::AlreadyProcessed { id } => format!("ID already processed: {id}"),
            JobOutcome::Rejected { id, .. } | JobOutcome::Failed { id } => {
                format!("Unable to process {id}")
            }
            JobOutcome::Succeeded { .. } => String::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            JobOutcome::BadRequest(_) => None,
            JobOutcome::AlreadyProcessed { id }
            | JobOutcome::Rejected { id, .. }
            | JobOutcome::Failed { id }
            | JobOutcome::Succeeded { id, .. } => Some(id),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// The collaborators a job drives.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ObjectStore>,
    pub fetcher: Arc<dyn ArticleFetcher>,
    pub converter: Arc<dyn ProjectConverter>,
    pub builder: Arc<dyn SiteBuilder>,
}

impl Collaborators {
    /// Use one toolchain for both conversion and build.
    pub fn new<T>(
        store: Arc<dyn ObjectStore>,
        fetcher: Arc<dyn ArticleFetcher>,
        toolchain: Arc<T>,
    ) -> Self
    where
        T: ProjectConverter + SiteBuilder + 'static,
    {
        Self {
            store,
            fetcher,
            converter: toolchain.clone(),
            builder: toolchain,
        }
    }
}

/// Runs conversion jobs. Cheap to share; jobs may run concurrently.
pub struct Orchestrator {
    config: ServiceConfig,
    deps: Collaborators,
    progress: ProgressCallback,
}

impl Orchestrator {
    pub fn new(config: ServiceConfig, deps: Collaborators) -> Self {
        Self {
            config,
            deps,
            progress: Arc::new(NoopProgressCallback),
        }
    }

    /// Receive in-process progress events for every job.
    pub fn with_progress_callback(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Current status record for `id`, if any.
    pub async fn status(&self, id: &str) -> Result<Option<StatusRecord>, Jats2SiteError> {
        status::read_status(self.deps.store.as_ref(), &self.config.prefix_for(id)).await
    }

    /// Handle one trigger to completion.
    pub async fn handle(&self, request: TriggerRequest) -> JobOutcome {
        let outcome = self.process(request).await;
        self.progress.on_job_complete(&outcome);
        outcome
    }

    async fn process(&self, request: TriggerRequest) -> JobOutcome {
        // ── Step 1: Classify ─────────────────────────────────────────────
        let Some(target) = request.target.filter(|t| !t.trim().is_empty()) else {
            return JobOutcome::BadRequest("no target in Pub/Sub message".to_string());
        };
        let classified = classify(&target, request.id.as_deref());
        let id = classified.id.clone();
        let prefix = self.config.prefix_for(&id);
        if storage::validate_key(&prefix).is_err() {
            info!("Unusable id {:?} for target {}", id, target);
            return JobOutcome::BadRequest(format!("unusable id: {id}"));
        }

        // ── Step 2: Idempotency gate ─────────────────────────────────────
        match gate::already_processed(self.deps.store.as_ref(), &prefix).await {
            Ok(true) => {
                info!("ID already processed: {}", id);
                return JobOutcome::AlreadyProcessed { id };
            }
            Ok(false) => {}
            Err(e) => {
                error!("Existence check for {} failed: {}", prefix, e);
                return JobOutcome::Failed { id };
            }
        }

        self.progress.on_job_start(&target, &id);
        let mut reporter = StatusReporter::new(self.deps.store.clone(), &prefix, &target);

        // ── Step 3: Eligibility ──────────────────────────────────────────
        let eligibility = match self.validate(&classified, &mut reporter).await {
            Ok(e) => e,
            Err(e) => return self.fail(&mut reporter, &id, e).await,
        };
        reporter.set_citation_license(eligibility.citation.clone(), eligibility.license.clone());

        // ── Step 4: Workspace + pipeline ─────────────────────────────────
        let workspace = match Workspace::acquire(&self.config.scratch_dir).await {
            Ok(ws) => ws,
            Err(e) => return self.fail(&mut reporter, &id, e).await,
        };
        let result = Controller::new(
            &self.config,
            &self.deps,
            &classified,
            &prefix,
            workspace.root(),
            eligibility,
            &mut reporter,
            self.progress.as_ref(),
        )
        .run()
        .await;

        // ── Step 5: Release, then record the outcome ─────────────────────
        if let Err(e) = workspace.release().await {
            warn!("Failed to remove workspace for {}: {}", id, e);
        }
        match result {
            Ok(log) => {
                info!("Finished {}", id);
                JobOutcome::Succeeded { id, log }
            }
            Err(e) => self.fail(&mut reporter, &id, e).await,
        }
    }

    /// Screen the target and, for PMC ids, check eligibility.
    async fn validate(
        &self,
        target: &ClassifiedTarget,
        reporter: &mut StatusReporter,
    ) -> Result<Eligibility, Jats2SiteError> {
        eligibility::screen(target, &self.config)?;
        if target.kind != TargetKind::Pmc {
            return Ok(Eligibility::default());
        }
        let message = format!("{}: Validating PMC ID", target.target);
        let progress = reporter.processing(Stage::Validating, message.as_str()).await?;
        self.progress.on_stage(Stage::Validating, progress, &message);
        let eligible =
            eligibility::check_pmc(self.deps.fetcher.as_ref(), &target.target, &target.id, &self.config)
                .await?;
        Ok(eligible)
    }

    /// Record a failure. Status write errors are logged and swallowed.
    async fn fail(&self, reporter: &mut StatusReporter, id: &str, err: Jats2SiteError) -> JobOutcome {
        match err {
            Jats2SiteError::Rejected(rejection) => self.reject(reporter, id, rejection).await,
            other => {
                error!("JATS convert job failed for ID {}: {}", id, other);
                let message = format!("Unable to process {id}");
                if let Err(e) = reporter.fail(message.as_str()).await {
                    warn!("Could not record failure for {}: {}", id, e);
                }
                self.progress
                    .on_stage(Stage::Failed, reporter.last_progress(), &message);
                JobOutcome::Failed { id: id.to_string() }
            }
        }
    }

    async fn reject(&self, reporter: &mut StatusReporter, id: &str, rejection: Rejection) -> JobOutcome {
        info!("Rejected {}: {}", id, rejection);
        if let Err(e) = reporter.reject(&rejection).await {
            warn!("Could not record rejection for {}: {}", id, e);
        }
        self.progress
            .on_stage(Stage::Failed, reporter.last_progress(), &rejection.message);
        JobOutcome::Rejected {
            id: id.to_string(),
            kind: rejection.kind,
        }
    }
}
