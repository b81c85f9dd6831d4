//! Job orchestration scenarios against scripted collaborators.
//!
//! Every test runs the real orchestrator, controller, status reporter and
//! workspace manager; only fetch, conversion, build and storage are doubles.

mod common;

use common::{FakeFetcher, FakeToolchain, Harness, ToolCall, FOLDER};
use jats2site::{
    classify, FailureKind, JobOutcome, JobProgressCallback, Stage, TriggerRequest, UploadError,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};

const PMC: &str = "PMC10134778";

fn progresses(statuses: &[Value]) -> Vec<f64> {
    statuses
        .iter()
        .filter_map(|s| s["progress"].as_f64())
        .collect()
}

fn assert_non_decreasing(values: &[f64]) {
    for pair in values.windows(2) {
        assert!(pair[1] >= pair[0], "progress went backwards: {values:?}");
    }
}

// ── Success path ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn pmc_article_is_published() {
    let h = Harness::new(
        FakeFetcher::new().with_pmc(PMC, Some("CC BY")),
        FakeToolchain::new(),
    );
    let cwd = std::env::current_dir().unwrap();

    let outcome = h.orchestrator.handle(TriggerRequest::new(PMC)).await;

    let JobOutcome::Succeeded { ref id, ref log } = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(id, PMC);
    assert_eq!(outcome.response_text(), "");
    assert!(log.times.download >= 0.0);
    assert!(log.times.process >= 0.0);
    assert!(log.times.upload >= 0.0);
    assert_eq!(log.uploads.uploaded, 3);
    assert_eq!(log.uploads.failed, 0);

    // Status sequence: validating, five stages, success.
    let statuses = h.statuses(PMC);
    let messages: Vec<&str> = statuses
        .iter()
        .map(|s| s["message"].as_str().unwrap())
        .collect();
    assert_eq!(
        messages,
        vec![
            "PMC10134778: Validating PMC ID",
            "PMC10134778: Downloading data",
            "PMC10134778: Converting data for the site",
            "PMC10134778: Building site",
            "PMC10134778: Saving data",
            "PMC10134778: Finalizing processing",
            "PMC10134778: Processing Complete",
        ]
    );
    let progress = progresses(&statuses);
    assert_eq!(progress, vec![0.0, 0.08, 0.32, 0.4, 0.8, 0.96, 1.0]);
    assert_non_decreasing(&progress);

    let last = h.last_status(PMC);
    assert_eq!(last["status"], "success");
    assert_eq!(last["progress"], 1.0);
    assert_eq!(last["license"], "CC BY");
    assert_eq!(last["citation"], "Nat Commun. 2023; 14:2301");
    assert_eq!(last["target"], PMC);
    assert!(last.get("error").is_none());

    // Artifacts under the job prefix.
    let prefix = Harness::prefix(PMC);
    for key in [
        "index.html",
        "config.json",
        "public/fig1.png",
        "content/PMC10134778.xml",
        "PMC10134778.log.yml",
        "status.json",
    ] {
        assert!(
            h.store.get(&format!("{prefix}{key}")).is_some(),
            "missing {prefix}{key}; have {:?}",
            h.store.keys()
        );
    }
    let raw = h.store.get(&format!("{prefix}content/{PMC}.xml")).unwrap();
    assert_eq!(raw, common::ARTICLE_XML.as_bytes());

    // Collaborators ran in one workspace, in order, and it is gone.
    let calls = h.tools.calls();
    assert!(matches!(calls[0], ToolCall::Convert { .. }));
    assert!(matches!(calls[1], ToolCall::Init { .. }));
    assert!(matches!(calls[2], ToolCall::Build { .. }));
    let workspaces = h.tools.workspaces();
    assert!(workspaces.iter().all(|w| w == &workspaces[0]));
    assert!(workspaces[0].starts_with(h.scratch.path()));
    assert!(!workspaces[0].exists());
    if let ToolCall::Convert { ref input, .. } = calls[0] {
        assert_eq!(input, &workspaces[0].join("PMC10134778.xml"));
    }
    assert_eq!(h.leftover_workspaces(), 0);
    assert_eq!(std::env::current_dir().unwrap(), cwd);
}

#[tokio::test]
async fn fetch_receives_archive_url_and_data_flag() {
    let h = Harness::new(
        FakeFetcher::new().with_pmc("PMC1", Some("CC0")),
        FakeToolchain::new(),
    );
    h.orchestrator.handle(TriggerRequest::new("PMC1")).await;

    let fetches = h.fetcher.fetches.lock().unwrap();
    assert_eq!(fetches.len(), 1);
    let (target, options) = &fetches[0];
    assert_eq!(target, "PMC1");
    assert!(options.data);
    assert_eq!(
        options.archive_url.as_deref(),
        Some("https://ftp.example.org/oa/PMC1.tar.gz")
    );
}

#[tokio::test]
async fn log_record_is_merged_and_uploaded() {
    let h = Harness::new(
        FakeFetcher::new()
            .with_pmc("PMC1", Some("CC BY"))
            .with_extra_file("PMC1.log.yml", b"source: europepmc\n")
            .with_extra_file("PMC1.tar.gz", &[0u8; 11]),
        FakeToolchain::new(),
    );
    let outcome = h.orchestrator.handle(TriggerRequest::new("PMC1")).await;
    let JobOutcome::Succeeded { log, .. } = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(log.sizes.archive, Some(11));
    assert_eq!(log.sizes.build, 12);

    let stored = h
        .store
        .get(&format!("{}PMC1.log.yml", Harness::prefix("PMC1")))
        .unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_slice(&stored).unwrap();
    assert_eq!(doc["source"].as_str(), Some("europepmc"));
    assert_eq!(doc["sizes"]["archive"].as_u64(), Some(11));
    assert_eq!(doc["uploads"]["uploaded"].as_u64(), Some(3));
    assert!(doc["date"].as_str().is_some());
}

#[tokio::test]
async fn manifest_gets_template_and_single_pdf() {
    let h = Harness::new(
        FakeFetcher::new()
            .with_pmc("PMC1", Some("CC BY"))
            .with_extra_file("main.pdf", b"%PDF-1.7"),
        FakeToolchain::new(),
    );
    assert!(h
        .orchestrator
        .handle(TriggerRequest::new("PMC1"))
        .await
        .is_success());

    let manifests = h.tools.manifests_at_build.lock().unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_str(&manifests[0]).unwrap();
    assert_eq!(doc["site"]["template"].as_str(), Some("/usr/app/theme"));
    let downloads = doc["project"]["downloads"].as_sequence().unwrap();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0]["url"].as_str(), Some("main.pdf"));
    assert_eq!(downloads[0]["filename"].as_str(), Some("PMC1.pdf"));
}

#[tokio::test]
async fn url_target_uses_hashed_id_and_skips_validation() {
    let url = "https://example.org/articles/42.xml";
    let id = classify(url, None).id;
    let h = Harness::new(FakeFetcher::new().with_document(url), FakeToolchain::new());

    let outcome = h.orchestrator.handle(TriggerRequest::new(url)).await;

    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(outcome.id(), Some(id.as_str()));
    assert!(h.fetcher.metadata_lookups.lock().unwrap().is_empty());
    let statuses = h.statuses(&id);
    assert_eq!(
        statuses[0]["message"],
        format!("{url}: Downloading data").as_str()
    );
    assert!(statuses[0].get("license").is_none());
    assert!(h
        .store
        .get(&format!("{}content/{id}.xml", Harness::prefix(&id)))
        .is_some());
    let fetches = h.fetcher.fetches.lock().unwrap();
    assert_eq!(fetches[0].1.archive_url, None);
}

#[tokio::test]
async fn doi_ids_keep_slashes_in_keys_but_not_in_files() {
    let doi = "10.1234/abc";
    let h = Harness::new(FakeFetcher::new().with_document(doi), FakeToolchain::new());

    assert!(h.orchestrator.handle(TriggerRequest::new(doi)).await.is_success());

    let prefix = format!("{FOLDER}/10.1234/abc/");
    assert!(h.store.get(&format!("{prefix}content/10.1234/abc.xml")).is_some());
    assert!(h.store.get(&format!("{prefix}10.1234.abc.log.yml")).is_some());
    let fetches = h.fetcher.fetches.lock().unwrap();
    assert!(fetches[0].1.output.ends_with("10.1234.abc.xml"));
}

#[tokio::test]
async fn explicit_id_overrides_target() {
    let url = "https://example.org/a.xml";
    let h = Harness::new(FakeFetcher::new().with_document(url), FakeToolchain::new());

    let outcome = h
        .orchestrator
        .handle(TriggerRequest::new(url).with_id("custom-id"))
        .await;

    assert_eq!(outcome.id(), Some("custom-id"));
    assert_eq!(h.last_status("custom-id")["status"], "success");
}

// ── Idempotency ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn existing_prefix_short_circuits() {
    let h = Harness::new(
        FakeFetcher::new().with_pmc("PMC1", Some("CC BY")),
        FakeToolchain::new(),
    );
    h.store
        .insert(format!("{}status.json", Harness::prefix("PMC1")), "{}");

    let outcome = h.orchestrator.handle(TriggerRequest::new("PMC1")).await;

    assert_eq!(outcome, JobOutcome::AlreadyProcessed { id: "PMC1".into() });
    assert_eq!(outcome.response_text(), "ID already processed: PMC1");
    assert_eq!(h.store.write_count(), 0);
    assert_eq!(h.fetcher.fetch_count(), 0);
    assert!(h.fetcher.metadata_lookups.lock().unwrap().is_empty());
    assert!(h.tools.calls().is_empty());
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn second_trigger_after_success_writes_nothing() {
    let h = Harness::new(
        FakeFetcher::new().with_pmc("PMC1", Some("CC BY")),
        FakeToolchain::new(),
    );
    assert!(h.orchestrator.handle(TriggerRequest::new("PMC1")).await.is_success());
    let writes = h.store.write_count();

    let again = h.orchestrator.handle(TriggerRequest::new("PMC1")).await;

    assert!(matches!(again, JobOutcome::AlreadyProcessed { .. }));
    assert_eq!(h.store.write_count(), writes);
    assert_eq!(h.fetcher.fetch_count(), 1);
}

// ── Rejections ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_pmc_id_is_non_pmc() {
    let h = Harness::new(FakeFetcher::new(), FakeToolchain::new());

    let outcome = h.orchestrator.handle(TriggerRequest::new("PMC00000000")).await;

    assert_eq!(
        outcome,
        JobOutcome::Rejected {
            id: "PMC00000000".into(),
            kind: FailureKind::NonPmc
        }
    );
    assert_eq!(outcome.response_text(), "Unable to process PMC00000000");
    let last = h.last_status("PMC00000000");
    assert_eq!(last["status"], "failure");
    assert_eq!(last["error"], "non-pmc");
    assert_eq!(last["message"], "PMC00000000: PMC ID cannot be found");
    assert!(last.get("progress").is_none());
    assert_eq!(h.fetcher.fetch_count(), 0);
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn closed_access_article_is_non_oa() {
    let h = Harness::new(
        FakeFetcher::new().with_doi("PMC5", "10.1000/closed"),
        FakeToolchain::new(),
    );

    let outcome = h.orchestrator.handle(TriggerRequest::new("PMC5")).await;

    assert!(matches!(
        outcome,
        JobOutcome::Rejected {
            kind: FailureKind::NonOa,
            ..
        }
    ));
    let last = h.last_status("PMC5");
    assert_eq!(last["error"], "non-oa");
    assert_eq!(last["doi"], "10.1000/closed");
}

#[tokio::test]
async fn non_cc_license_is_rejected_before_any_workspace() {
    let h = Harness::new(
        FakeFetcher::new()
            .with_pmc("PMC7", Some("CC BY-NC"))
            .with_doi("PMC7", "10.1000/nc"),
        FakeToolchain::new(),
    );

    let outcome = h.orchestrator.handle(TriggerRequest::new("PMC7")).await;

    assert!(matches!(
        outcome,
        JobOutcome::Rejected {
            kind: FailureKind::NonCc,
            ..
        }
    ));
    let last = h.last_status("PMC7");
    assert_eq!(last["status"], "failure");
    assert_eq!(last["error"], "non-cc");
    assert_eq!(last["license"], "CC BY-NC");
    assert_eq!(last["citation"], "Nat Commun. 2023; 14:2301");
    assert_eq!(last["doi"], "10.1000/nc");
    assert_eq!(h.fetcher.fetch_count(), 0);
    assert!(h.tools.calls().is_empty());
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn missing_download_is_invalid() {
    let h = Harness::new(
        FakeFetcher::new()
            .with_pmc("PMC1", Some("CC BY"))
            .without_document("PMC1"),
        FakeToolchain::new(),
    );

    let outcome = h.orchestrator.handle(TriggerRequest::new("PMC1")).await;

    assert!(matches!(
        outcome,
        JobOutcome::Rejected {
            kind: FailureKind::Invalid,
            ..
        }
    ));
    let last = h.last_status("PMC1");
    assert_eq!(last["error"], "invalid");
    assert_eq!(last["message"], "PMC1: Unable to download JATS data");
    assert_eq!(last["target"], "PMC1");
    assert_eq!(h.fetcher.fetch_count(), 1);
    assert!(h.tools.calls().is_empty());
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn pmc_only_mode_rejects_other_targets_without_fetching() {
    let h = Harness::with_config(
        FakeFetcher::new().with_document("10.1234/abc"),
        FakeToolchain::new(),
        |b| b.pmc_only(true),
    );

    let outcome = h.orchestrator.handle(TriggerRequest::new("10.1234/abc")).await;

    assert!(matches!(
        outcome,
        JobOutcome::Rejected {
            kind: FailureKind::Invalid,
            ..
        }
    ));
    let last = h.last_status("10.1234/abc");
    assert_eq!(last["message"], "10.1234/abc: Invalid PMC ID");
    assert_eq!(h.fetcher.fetch_count(), 0);
    assert!(h.fetcher.metadata_lookups.lock().unwrap().is_empty());
}

#[tokio::test]
async fn opaque_target_is_invalid() {
    let h = Harness::new(FakeFetcher::new(), FakeToolchain::new());

    let outcome = h.orchestrator.handle(TriggerRequest::new("not an article")).await;

    assert!(matches!(
        outcome,
        JobOutcome::Rejected {
            kind: FailureKind::Invalid,
            ..
        }
    ));
    assert_eq!(h.last_status("not an article")["error"], "invalid");
    assert_eq!(h.fetcher.fetch_count(), 0);
}

#[tokio::test]
async fn missing_target_is_bad_request() {
    let h = Harness::new(FakeFetcher::new(), FakeToolchain::new());

    let outcome = h.orchestrator.handle(TriggerRequest::default()).await;

    assert_eq!(
        outcome,
        JobOutcome::BadRequest("no target in Pub/Sub message".into())
    );
    assert_eq!(
        outcome.response_text(),
        "Bad Request: no target in Pub/Sub message"
    );
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn ids_escaping_the_storage_prefix_are_bad_requests() {
    for (target, id) in [("10.1234/../x", None), (".", None), ("PMC1", Some("a/./b"))] {
        let h = Harness::new(
            FakeFetcher::new().with_pmc("PMC1", Some("CC BY")),
            FakeToolchain::new(),
        );
        let mut request = TriggerRequest::new(target);
        if let Some(id) = id {
            request = request.with_id(id);
        }

        let outcome = h.orchestrator.handle(request).await;

        assert!(
            matches!(outcome, JobOutcome::BadRequest(ref m) if m.starts_with("unusable id")),
            "{target}: {outcome:?}"
        );
        assert_eq!(h.store.write_count(), 0);
        assert_eq!(h.fetcher.fetch_count(), 0);
        assert_eq!(h.leftover_workspaces(), 0);
    }
}

// ── Internal failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn build_failure_is_generic_and_cleans_up() {
    let h = Harness::new(
        FakeFetcher::new().with_pmc("PMC1", Some("CC BY")),
        FakeToolchain::new().failing_build(),
    );
    let cwd = std::env::current_dir().unwrap();

    let outcome = h.orchestrator.handle(TriggerRequest::new("PMC1")).await;

    assert_eq!(outcome, JobOutcome::Failed { id: "PMC1".into() });
    assert_eq!(outcome.response_text(), "Unable to process PMC1");
    let statuses = h.statuses("PMC1");
    assert_non_decreasing(&progresses(&statuses));
    assert!(statuses.iter().all(|s| s["status"] != "success"));
    let last = statuses.last().unwrap();
    assert_eq!(last["status"], "failure");
    assert_eq!(last["message"], "Unable to process PMC1");
    assert!(last.get("error").is_none());
    assert!(h
        .store
        .get(&format!("{}index.html", Harness::prefix("PMC1")))
        .is_none());
    assert_eq!(h.leftover_workspaces(), 0);
    assert_eq!(std::env::current_dir().unwrap(), cwd);
}

#[tokio::test]
async fn convert_failure_stops_before_build() {
    let h = Harness::new(
        FakeFetcher::new().with_pmc("PMC1", Some("CC BY")),
        FakeToolchain::new().failing_convert(),
    );

    let outcome = h.orchestrator.handle(TriggerRequest::new("PMC1")).await;

    assert!(matches!(outcome, JobOutcome::Failed { .. }));
    assert_eq!(h.tools.calls().len(), 1);
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn fetch_error_is_internal_failure() {
    let h = Harness::new(
        FakeFetcher::new()
            .with_pmc("PMC1", Some("CC BY"))
            .failing_fetch(),
        FakeToolchain::new(),
    );

    let outcome = h.orchestrator.handle(TriggerRequest::new("PMC1")).await;

    assert!(matches!(outcome, JobOutcome::Failed { .. }));
    let last = h.last_status("PMC1");
    assert_eq!(last["status"], "failure");
    assert!(last.get("error").is_none());
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn unwritable_store_fails_before_any_workspace() {
    let h = Harness::new(
        FakeFetcher::new().with_pmc("PMC1", Some("CC BY")),
        FakeToolchain::new(),
    );
    h.store.fail_puts(true);

    let outcome = h.orchestrator.handle(TriggerRequest::new("PMC1")).await;

    assert!(matches!(outcome, JobOutcome::Failed { .. }));
    assert_eq!(h.store.write_count(), 0);
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test]
async fn unrecordable_failure_still_releases_workspace() {
    let h = Harness::new(
        FakeFetcher::new().with_pmc("PMC1", Some("CC BY")),
        FakeToolchain::new().failing_build(),
    );
    h.store.fail_puts_containing(r#""status":"failure""#);
    let cwd = std::env::current_dir().unwrap();

    let outcome = h.orchestrator.handle(TriggerRequest::new("PMC1")).await;

    assert_eq!(outcome, JobOutcome::Failed { id: "PMC1".into() });
    assert!(matches!(h.tools.calls().last(), Some(ToolCall::Build { .. })));
    let last = h.last_status("PMC1");
    assert_eq!(last["status"], "processing");
    assert_eq!(last["message"], "PMC1: Building site");
    let workspaces = h.tools.workspaces();
    assert!(!workspaces.is_empty());
    assert!(workspaces.iter().all(|ws| !ws.exists()));
    assert_eq!(h.leftover_workspaces(), 0);
    assert_eq!(std::env::current_dir().unwrap(), cwd);
}

#[tokio::test]
async fn single_upload_failure_is_swallowed_and_counted() {
    let h = Harness::new(
        FakeFetcher::new().with_pmc("PMC1", Some("CC BY")),
        FakeToolchain::new(),
    );
    h.store.fail_uploads_ending_with(".png");

    let outcome = h.orchestrator.handle(TriggerRequest::new("PMC1")).await;

    let JobOutcome::Succeeded { log, .. } = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(log.uploads.uploaded, 2);
    assert_eq!(log.uploads.failed, 1);
    let prefix = Harness::prefix("PMC1");
    assert!(h.store.get(&format!("{prefix}public/fig1.png")).is_none());
    assert!(h.store.get(&format!("{prefix}index.html")).is_some());
    assert_eq!(h.last_status("PMC1")["status"], "success");
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_jobs_use_separate_workspaces() {
    let h = Harness::new(
        FakeFetcher::new()
            .with_pmc("PMC1", Some("CC BY"))
            .with_pmc("PMC2", Some("CC BY"))
            .with_pmc("PMC3", Some("CC0")),
        FakeToolchain::new(),
    );
    let cwd = std::env::current_dir().unwrap();

    let (a, b, c) = tokio::join!(
        h.orchestrator.handle(TriggerRequest::new("PMC1")),
        h.orchestrator.handle(TriggerRequest::new("PMC2")),
        h.orchestrator.handle(TriggerRequest::new("PMC3")),
    );

    assert!(a.is_success() && b.is_success() && c.is_success());
    let mut workspaces = h.tools.workspaces();
    workspaces.sort();
    workspaces.dedup();
    assert_eq!(workspaces.len(), 3);
    for id in ["PMC1", "PMC2", "PMC3"] {
        assert_eq!(h.last_status(id)["status"], "success");
        let raw = h
            .store
            .get(&format!("{}content/{id}.xml", Harness::prefix(id)))
            .unwrap();
        assert_eq!(raw, common::ARTICLE_XML.as_bytes());
    }
    assert_eq!(h.leftover_workspaces(), 0);
    assert_eq!(std::env::current_dir().unwrap(), cwd);
}

// ── Progress callback ────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    stages: Mutex<Vec<(Stage, f64)>>,
    upload_errors: Mutex<Vec<UploadError>>,
    completed: Mutex<Vec<JobOutcome>>,
}

impl JobProgressCallback for Recorder {
    fn on_stage(&self, stage: Stage, progress: f64, _message: &str) {
        self.stages.lock().unwrap().push((stage, progress));
    }

    fn on_upload_error(&self, error: &UploadError) {
        self.upload_errors.lock().unwrap().push(error.clone());
    }

    fn on_job_complete(&self, outcome: &JobOutcome) {
        self.completed.lock().unwrap().push(outcome.clone());
    }
}

#[tokio::test]
async fn progress_callback_sees_every_stage() {
    let rec = Arc::new(Recorder::default());
    let h = Harness::new(
        FakeFetcher::new().with_pmc("PMC1", Some("CC BY")),
        FakeToolchain::new(),
    )
    .observed_by(rec.clone());
    h.store.fail_uploads_ending_with("config.json");

    h.orchestrator.handle(TriggerRequest::new("PMC1")).await;

    let stages: Vec<Stage> = rec.stages.lock().unwrap().iter().map(|(s, _)| *s).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Validating,
            Stage::Downloading,
            Stage::Converting,
            Stage::Building,
            Stage::Uploading,
            Stage::Finalizing,
            Stage::Succeeded,
        ]
    );
    assert_eq!(rec.upload_errors.lock().unwrap().len(), 1);
    let completed = rec.completed.lock().unwrap();
    assert_eq!(completed.len(), 1);
    assert!(completed[0].is_success());
}

#[tokio::test]
async fn progress_callback_sees_rejection() {
    let rec = Arc::new(Recorder::default());
    let h = Harness::new(FakeFetcher::new(), FakeToolchain::new()).observed_by(rec.clone());

    h.orchestrator.handle(TriggerRequest::new("PMC9")).await;

    let stages = rec.stages.lock().unwrap();
    assert_eq!(stages.last().map(|(s, _)| *s), Some(Stage::Failed));
    assert!(matches!(
        rec.completed.lock().unwrap()[0],
        JobOutcome::Rejected {
            kind: FailureKind::NonPmc,
            ..
        }
    ));
}
