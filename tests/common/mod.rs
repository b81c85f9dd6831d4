//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use jats2site::{
    ArticleFetcher, Collaborators, DownloadMetadata, FetchOptions, Jats2SiteError, MemoryStore,
    Orchestrator, ProjectConverter, ServiceConfig, ServiceConfigBuilder, SiteBuilder,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const FOLDER: &str = "test-folder";

pub const ARTICLE_XML: &str = r#"<?xml version="1.0"?><article><front><article-meta><title-group><article-title>T</article-title></title-group></article-meta></front></article>"#;

// ── Fetcher ──────────────────────────────────────────────────────────────────

/// Serves canned metadata and documents, and records every call.
#[derive(Default)]
pub struct FakeFetcher {
    metadata: HashMap<String, DownloadMetadata>,
    dois: HashMap<String, String>,
    documents: HashMap<String, String>,
    /// Extra files written next to the document (PDFs, archives).
    extras: Vec<(String, Vec<u8>)>,
    fail_fetch: bool,
    pub fetches: Mutex<Vec<(String, FetchOptions)>>,
    pub metadata_lookups: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// An open-access PMC article with the given license and a document.
    pub fn with_pmc(mut self, pmcid: &str, license: Option<&str>) -> Self {
        self.metadata.insert(
            pmcid.to_string(),
            DownloadMetadata {
                url: format!("https://ftp.example.org/oa/{pmcid}.tar.gz"),
                citation: Some("Nat Commun. 2023; 14:2301".to_string()),
                license: license.map(String::from),
            },
        );
        self.documents
            .insert(pmcid.to_string(), ARTICLE_XML.to_string());
        self
    }

    pub fn with_doi(mut self, pmcid: &str, doi: &str) -> Self {
        self.dois.insert(pmcid.to_string(), doi.to_string());
        self
    }

    /// A document for a non-PMC target.
    pub fn with_document(mut self, target: &str) -> Self {
        self.documents
            .insert(target.to_string(), ARTICLE_XML.to_string());
        self
    }

    /// Metadata exists but fetching the document yields nothing.
    pub fn without_document(mut self, target: &str) -> Self {
        self.documents.remove(target);
        self
    }

    pub fn with_extra_file(mut self, name: &str, bytes: &[u8]) -> Self {
        self.extras.push((name.to_string(), bytes.to_vec()));
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl ArticleFetcher for FakeFetcher {
    async fn fetch(&self, target: &str, options: &FetchOptions) -> Result<(), Jats2SiteError> {
        self.fetches
            .lock()
            .unwrap()
            .push((target.to_string(), options.clone()));
        if self.fail_fetch {
            return Err(Jats2SiteError::FetchFailed {
                target: target.to_string(),
                reason: "connection reset".to_string(),
            });
        }
        if let Some(xml) = self.documents.get(target) {
            std::fs::write(&options.output, xml).unwrap();
            let dir = options.output.parent().unwrap();
            for (name, bytes) in &self.extras {
                std::fs::write(dir.join(name), bytes).unwrap();
            }
        }
        Ok(())
    }

    async fn download_metadata(&self, pmcid: &str) -> Result<DownloadMetadata, Jats2SiteError> {
        self.metadata_lookups.lock().unwrap().push(pmcid.to_string());
        self.metadata
            .get(pmcid)
            .cloned()
            .ok_or_else(|| Jats2SiteError::MetadataUnavailable {
                id: pmcid.to_string(),
                reason: "idDoesNotExist".to_string(),
            })
    }

    async fn pmcid_to_doi(&self, pmcid: &str) -> Option<String> {
        self.dois.get(pmcid).cloned()
    }
}

// ── Converter + builder ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Convert { workspace: PathBuf, input: PathBuf },
    Init { workspace: PathBuf },
    Build { workspace: PathBuf },
}

/// Writes a minimal project and site tree, like the real tools would.
#[derive(Default)]
pub struct FakeToolchain {
    fail_convert: bool,
    fail_build: bool,
    pub calls: Mutex<Vec<ToolCall>>,
    /// Manifest contents as seen by `build`.
    pub manifests_at_build: Mutex<Vec<String>>,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_convert(mut self) -> Self {
        self.fail_convert = true;
        self
    }

    pub fn failing_build(mut self) -> Self {
        self.fail_build = true;
        self
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn workspaces(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .map(|c| match c {
                ToolCall::Convert { workspace, .. }
                | ToolCall::Init { workspace }
                | ToolCall::Build { workspace } => workspace,
            })
            .collect()
    }
}

#[async_trait]
impl ProjectConverter for FakeToolchain {
    async fn convert(&self, workspace: &Path, input: &Path) -> Result<(), Jats2SiteError> {
        self.calls.lock().unwrap().push(ToolCall::Convert {
            workspace: workspace.to_path_buf(),
            input: input.to_path_buf(),
        });
        if self.fail_convert {
            return Err(Jats2SiteError::CommandFailed {
                program: "jats".into(),
                status: "exit status: 1".into(),
                stderr: "unsupported article type".into(),
            });
        }
        std::fs::write(workspace.join("index.md"), "# T\n").unwrap();
        Ok(())
    }
}

#[async_trait]
impl SiteBuilder for FakeToolchain {
    async fn init(&self, workspace: &Path) -> Result<(), Jats2SiteError> {
        self.calls.lock().unwrap().push(ToolCall::Init {
            workspace: workspace.to_path_buf(),
        });
        std::fs::write(
            workspace.join("myst.yml"),
            "version: 1\nproject:\n  title: T\nsite:\n  template: book-theme\n",
        )
        .unwrap();
        Ok(())
    }

    async fn build(&self, workspace: &Path) -> Result<(), Jats2SiteError> {
        self.calls.lock().unwrap().push(ToolCall::Build {
            workspace: workspace.to_path_buf(),
        });
        self.manifests_at_build
            .lock()
            .unwrap()
            .push(std::fs::read_to_string(workspace.join("myst.yml")).unwrap());
        if self.fail_build {
            return Err(Jats2SiteError::CommandFailed {
                program: "myst".into(),
                status: "exit status: 1".into(),
                stderr: "template not found".into(),
            });
        }
        let site = workspace.join("_build/site");
        std::fs::create_dir_all(site.join("public")).unwrap();
        std::fs::write(site.join("index.html"), "<html/>").unwrap();
        std::fs::write(site.join("config.json"), "{}").unwrap();
        std::fs::write(site.join("public/fig1.png"), [1u8, 2, 3]).unwrap();
        Ok(())
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub store: MemoryStore,
    pub fetcher: Arc<FakeFetcher>,
    pub tools: Arc<FakeToolchain>,
    pub scratch: TempDir,
}

impl Harness {
    pub fn new(fetcher: FakeFetcher, tools: FakeToolchain) -> Self {
        Self::with_config(fetcher, tools, |b| b)
    }

    pub fn with_config(
        fetcher: FakeFetcher,
        tools: FakeToolchain,
        configure: impl FnOnce(ServiceConfigBuilder) -> ServiceConfigBuilder,
    ) -> Self {
        // RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let scratch = TempDir::new().unwrap();
        let config = configure(
            ServiceConfig::builder()
                .storage_folder(FOLDER)
                .scratch_dir(scratch.path()),
        )
        .build()
        .unwrap();
        let store = MemoryStore::new();
        let fetcher = Arc::new(fetcher);
        let tools = Arc::new(tools);
        let deps = Collaborators {
            store: Arc::new(store.clone()),
            fetcher: fetcher.clone(),
            converter: tools.clone(),
            builder: tools.clone(),
        };
        Self {
            orchestrator: Orchestrator::new(config, deps),
            store,
            fetcher,
            tools,
            scratch,
        }
    }

    pub fn prefix(id: &str) -> String {
        format!("{FOLDER}/{id}/")
    }

    /// Every status record written for `id`, oldest first.
    pub fn statuses(&self, id: &str) -> Vec<serde_json::Value> {
        self.store
            .writes_to(&format!("{}status.json", Self::prefix(id)))
            .iter()
            .map(|b| serde_json::from_slice(b).unwrap())
            .collect()
    }

    pub fn last_status(&self, id: &str) -> serde_json::Value {
        self.statuses(id)
            .pop()
            .unwrap_or_else(|| panic!("no status written for {id}"))
    }

    /// Directories left behind in the scratch root.
    pub fn leftover_workspaces(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }
}

impl Harness {
    pub fn observed_by(mut self, cb: jats2site::ProgressCallback) -> Self {
        self.orchestrator = self.orchestrator.with_progress_callback(cb);
        self
    }
}
