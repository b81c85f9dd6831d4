//! External collaborators the orchestrator drives but does not implement.
//!
//! These are infrastructure seams only: fetching article markup, converting
//! it into a project, and building a site. Each is a trait so the pipeline
//! can be exercised with scripted doubles, with one concrete adapter each:
//!
//! * [`JatsFetcher`]: PMC OA service, NCBI ID converter and Europe PMC over HTTP
//! * [`MystCli`]    : `jats convert` / `myst init` / `myst build` as child processes

pub mod jats;
pub mod myst;

pub use jats::{JatsFetcher, JatsFetcherConfig};
pub use myst::{MystCli, MystCommands};

use crate::error::Jats2SiteError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where and how much to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Destination of the article XML. Left absent if nothing usable was found.
    pub output: PathBuf,
    /// Also fetch the full data package (archive) when one is known.
    pub data: bool,
    /// Archive location discovered while checking eligibility, if any.
    pub archive_url: Option<String>,
}

/// Download metadata published for an open-access PMC article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadMetadata {
    /// Location of the article package.
    pub url: String,
    pub citation: Option<String>,
    pub license: Option<String>,
}

/// The document-fetch collaborator.
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    /// Fetch `target` into `options.output`.
    ///
    /// Not finding anything is not an error: the output is simply left
    /// absent. `Err` is reserved for the fetcher itself breaking.
    async fn fetch(&self, target: &str, options: &FetchOptions) -> Result<(), Jats2SiteError>;

    /// Resolve download metadata for a PMC id; fails if PMC has none.
    async fn download_metadata(&self, pmcid: &str) -> Result<DownloadMetadata, Jats2SiteError>;

    /// Best-effort PMC id → DOI lookup.
    async fn pmcid_to_doi(&self, pmcid: &str) -> Option<String>;
}

/// The markup-to-project conversion collaborator.
#[async_trait]
pub trait ProjectConverter: Send + Sync {
    /// Convert `input` into project files written alongside it in `workspace`.
    async fn convert(&self, workspace: &Path, input: &Path) -> Result<(), Jats2SiteError>;
}

/// The static-site build collaborator.
#[async_trait]
pub trait SiteBuilder: Send + Sync {
    /// Generate the project and site manifest in `workspace`.
    async fn init(&self, workspace: &Path) -> Result<(), Jats2SiteError>;

    /// Build the site; output lands under the configured site output path.
    async fn build(&self, workspace: &Path) -> Result<(), Jats2SiteError>;
}
