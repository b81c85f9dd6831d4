//! The pipeline state machine for one accepted job.
//!
//! ```text
//! Downloading ──▶ Converting ──▶ Building ──▶ Uploading ──▶ Finalizing ──▶ Succeeded
//!      │
//!      └── no document ──▶ Failed (invalid)
//! ```
//!
//! Stages run strictly in order. Each one first writes its processing status
//! and only then starts work. Any error escapes [`Controller::run`] unchanged;
//! the orchestrator owns the failure path and workspace release.

use crate::config::ServiceConfig;
use crate::eligibility::Eligibility;
use crate::error::{FailureKind, Jats2SiteError, Rejection};
use crate::metrics::{self, LogRecord, OutputSizes, StageTimes, Stopwatch, UploadCounts};
use crate::orchestrator::Collaborators;
use crate::pipeline::{fetch, manifest, publish, Stage};
use crate::progress::JobProgressCallback;
use crate::status::{Provenance, StatusReporter};
use crate::target::ClassifiedTarget;
use std::path::Path;
use tracing::{debug, info};

/// Drives one job through the pipeline inside its workspace.
pub struct Controller<'a> {
    config: &'a ServiceConfig,
    deps: &'a Collaborators,
    target: &'a ClassifiedTarget,
    prefix: &'a str,
    workspace: &'a Path,
    eligibility: Eligibility,
    reporter: &'a mut StatusReporter,
    progress: &'a dyn JobProgressCallback,
}

impl<'a> Controller<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &'a ServiceConfig,
        deps: &'a Collaborators,
        target: &'a ClassifiedTarget,
        prefix: &'a str,
        workspace: &'a Path,
        eligibility: Eligibility,
        reporter: &'a mut StatusReporter,
        progress: &'a dyn JobProgressCallback,
    ) -> Self {
        Self {
            config,
            deps,
            target,
            prefix,
            workspace,
            eligibility,
            reporter,
            progress,
        }
    }

    /// Run every stage; returns the log record written on success.
    pub async fn run(mut self) -> Result<LogRecord, Jats2SiteError> {
        let name = self.target.target.clone();
        let mut clock = Stopwatch::start();

        // ── Step 1: Download ─────────────────────────────────────────────
        self.enter(Stage::Downloading, format!("{name}: Downloading data"))
            .await?;
        let document = fetch::fetch_document(
            self.deps.fetcher.as_ref(),
            self.workspace,
            self.target,
            self.config.fetch_data,
            self.eligibility.archive_url.take(),
        )
        .await?;
        let Some(document) = document else {
            return Err(Rejection::new(
                FailureKind::Invalid,
                format!("{name}: Unable to download JATS data"),
            )
            .with_provenance(Provenance::for_target(&name))
            .into());
        };
        let download_secs = clock.lap();

        // ── Step 2: Convert ──────────────────────────────────────────────
        self.enter(Stage::Converting, format!("{name}: Converting data for the site"))
            .await?;
        self.deps
            .converter
            .convert(self.workspace, &document.path)
            .await?;

        // ── Step 3: Build ────────────────────────────────────────────────
        self.enter(Stage::Building, format!("{name}: Building site"))
            .await?;
        self.deps.builder.init(self.workspace).await?;
        let manifest_path = manifest::manifest_path(self.workspace, &self.config.manifest_file);
        let pdfs = manifest::discover_pdfs(self.workspace).await?;
        debug!("Found {} PDF(s) to offer as downloads", pdfs.len());
        manifest::amend_manifest(
            &manifest_path,
            &self.config.site_template,
            &pdfs,
            &self.target.id,
        )
        .await?;
        self.deps.builder.build(self.workspace).await?;
        let process_secs = clock.lap();

        // ── Step 4: Upload ───────────────────────────────────────────────
        self.enter(Stage::Uploading, format!("{name}: Saving data"))
            .await?;
        let site = self.workspace.join(&self.config.site_output);
        let report = publish::upload_tree(self.deps.store.as_ref(), &site, self.prefix).await?;
        for failure in &report.failures {
            self.progress.on_upload_error(failure);
        }
        let content_key = format!("{}content/{}.xml", self.prefix, self.target.id);
        self.deps.store.upload(&document.path, &content_key).await?;
        info!(
            "Uploaded {} file(s), {} failed",
            report.uploaded,
            report.failed()
        );

        // ── Step 5: Finalize ─────────────────────────────────────────────
        self.enter(Stage::Finalizing, format!("{name}: Finalizing processing"))
            .await?;
        let upload_secs = clock.lap();
        let record = LogRecord::new(
            StageTimes {
                download: download_secs,
                process: process_secs,
                upload: upload_secs,
            },
            OutputSizes {
                archive: metrics::find_archive(self.workspace).await?,
                build: metrics::dir_size(&self.workspace.join(&self.config.build_root)).await?,
            },
            UploadCounts {
                uploaded: report.uploaded,
                failed: report.failed(),
            },
        );
        let log_name = format!("{}.log.yml", self.target.file_stem());
        let log_path = self.workspace.join(&log_name);
        metrics::write_log(&log_path, &record).await?;
        self.deps
            .store
            .upload(&log_path, &format!("{}{}", self.prefix, log_name))
            .await?;

        let done = format!("{name}: Processing Complete");
        self.reporter.success(done.as_str()).await?;
        self.progress
            .on_stage(Stage::Succeeded, Stage::Succeeded.progress(), &done);
        Ok(record)
    }

    async fn enter(&mut self, stage: Stage, message: String) -> Result<(), Jats2SiteError> {
        debug!("{} -> {}", self.target.id, stage);
        let progress = self.reporter.processing(stage, message.as_str()).await?;
        self.progress.on_stage(stage, progress, &message);
        Ok(())
    }
}
