//! HTTP article fetcher backed by NCBI and Europe PMC web services.
//!
//! * **Metadata** comes from the PMC OA web service, one `<record>` per
//!   article carrying `citation`, `license` and a package `<link>`.
//! * **Identifier conversion** (PMCID ⇄ DOI) uses the NCBI ID converter's
//!   JSON output.
//! * **Article XML** comes from Europe PMC's `fullTextXML` endpoint for PMC
//!   ids and DOIs, or straight from the URL for URL targets.
//!
//! Services answering with a non-success status, or with a body that is not
//! JATS, leave the output absent. Only transport-level failures are errors.

use super::{ArticleFetcher, DownloadMetadata, FetchOptions};
use crate::error::Jats2SiteError;
use crate::target::{classify, TargetKind};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

static OA_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<error[^>]*>([^<]*)</error>").expect("valid regex"));
static OA_RECORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<record\s([^>]*)>").expect("valid regex"));
static OA_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"<link\s([^>]*?)/?>").expect("valid regex"));
static XML_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([\w-]+)="([^"]*)""#).expect("valid regex"));

/// Endpoints and limits for [`JatsFetcher`].
#[derive(Debug, Clone)]
pub struct JatsFetcherConfig {
    /// PMC OA web service (`oa.fcgi`).
    pub oa_service: String,
    /// NCBI PMC ID converter.
    pub id_converter: String,
    /// Europe PMC REST base; `/{PMCID}/fullTextXML` is appended.
    pub europepmc: String,
    /// `tool` parameter sent to NCBI, identifying this client.
    pub tool: String,
    /// Per-request timeout in seconds. Default: 120.
    pub timeout_secs: u64,
}

impl Default for JatsFetcherConfig {
    fn default() -> Self {
        Self {
            oa_service: "https://www.ncbi.nlm.nih.gov/pmc/utils/oa/oa.fcgi".to_string(),
            id_converter: "https://www.ncbi.nlm.nih.gov/pmc/utils/idconv/v1.0/".to_string(),
            europepmc: "https://www.ebi.ac.uk/europepmc/webservices/rest".to_string(),
            tool: "jats2site".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdConvResponse {
    #[serde(default)]
    records: Vec<IdRecord>,
}

#[derive(Debug, Deserialize)]
struct IdRecord {
    pmcid: Option<String>,
    doi: Option<String>,
    status: Option<String>,
}

/// Fetches JATS XML (and optionally the article package) over HTTP.
#[derive(Debug, Clone)]
pub struct JatsFetcher {
    client: reqwest::Client,
    config: JatsFetcherConfig,
}

impl JatsFetcher {
    pub fn new(config: JatsFetcherConfig) -> Result<Self, Jats2SiteError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Jats2SiteError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// GET `url`; `None` on a non-success status.
    async fn get_bytes(&self, url: &str) -> Result<Option<Vec<u8>>, Jats2SiteError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            Jats2SiteError::FetchFailed {
                target: url.to_string(),
                reason: e.to_string(),
            }
        })?;
        if !response.status().is_success() {
            debug!("GET {} -> HTTP {}", url, response.status());
            return Ok(None);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Jats2SiteError::FetchFailed {
                target: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(bytes.to_vec()))
    }

    async fn id_record(&self, id: &str) -> Option<IdRecord> {
        let response = self
            .client
            .get(&self.config.id_converter)
            .query(&[("ids", id), ("format", "json"), ("tool", self.config.tool.as_str())])
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        let parsed: IdConvResponse = response.json().await.ok()?;
        parsed
            .records
            .into_iter()
            .next()
            .filter(|r| r.status.as_deref() != Some("error"))
    }

    async fn pmcid_for_doi(&self, doi: &str) -> Option<String> {
        self.id_record(doi).await.and_then(|r| r.pmcid)
    }

    fn full_text_url(&self, pmcid: &str) -> String {
        format!("{}/{}/fullTextXML", self.config.europepmc.trim_end_matches('/'), pmcid)
    }

    async fn fetch_archive(&self, url: &str, output: &Path) -> Result<(), Jats2SiteError> {
        let url = ftp_to_https(url);
        let Some(bytes) = self.get_bytes(&url).await? else {
            warn!("Article package unavailable: {}", url);
            return Ok(());
        };
        let dest = output.with_file_name(archive_file_name(&url, output));
        write_file(&dest, &bytes).await?;
        info!("Downloaded package to {}", dest.display());
        Ok(())
    }
}

#[async_trait]
impl ArticleFetcher for JatsFetcher {
    async fn fetch(&self, target: &str, options: &FetchOptions) -> Result<(), Jats2SiteError> {
        let xml_url = match classify(target, None).kind {
            TargetKind::Pmc => self.full_text_url(target),
            TargetKind::Doi => match self.pmcid_for_doi(target).await {
                Some(pmcid) => self.full_text_url(&pmcid),
                None => {
                    warn!("No PMC record for DOI {}", target);
                    return Ok(());
                }
            },
            TargetKind::Url => target.to_string(),
            TargetKind::Opaque => return Ok(()),
        };

        info!("Fetching JATS from {}", xml_url);
        match self.get_bytes(&xml_url).await? {
            Some(bytes) if looks_like_jats(&bytes) => write_file(&options.output, &bytes).await?,
            Some(_) => warn!("{} did not return JATS XML", xml_url),
            None => warn!("{} returned no content", xml_url),
        }

        if options.data {
            if let Some(ref archive) = options.archive_url {
                self.fetch_archive(archive, &options.output).await?;
            }
        }
        Ok(())
    }

    async fn download_metadata(&self, pmcid: &str) -> Result<DownloadMetadata, Jats2SiteError> {
        let response = self
            .client
            .get(&self.config.oa_service)
            .query(&[("id", pmcid)])
            .send()
            .await
            .map_err(|e| Jats2SiteError::MetadataUnavailable {
                id: pmcid.to_string(),
                reason: e.to_string(),
            })?;
        let body = response
            .text()
            .await
            .map_err(|e| Jats2SiteError::MetadataUnavailable {
                id: pmcid.to_string(),
                reason: e.to_string(),
            })?;
        parse_oa_record(&body).map_err(|reason| Jats2SiteError::MetadataUnavailable {
            id: pmcid.to_string(),
            reason,
        })
    }

    async fn pmcid_to_doi(&self, pmcid: &str) -> Option<String> {
        self.id_record(pmcid).await.and_then(|r| r.doi)
    }
}

/// Extract download metadata from a PMC OA service response.
pub fn parse_oa_record(body: &str) -> Result<DownloadMetadata, String> {
    if let Some(caps) = OA_ERROR.captures(body) {
        return Err(decode_entities(caps[1].trim()));
    }
    let record = OA_RECORD
        .captures(body)
        .ok_or_else(|| "no record in OA response".to_string())?;
    let attr = |attrs: &str, name: &str| {
        XML_ATTR
            .captures_iter(attrs)
            .find(|c| &c[1] == name)
            .map(|c| decode_entities(&c[2]))
    };

    let links: Vec<&str> = OA_LINK
        .captures_iter(body)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let href = links
        .iter()
        .find(|l| attr(l, "format").as_deref() == Some("tgz"))
        .or_else(|| links.first())
        .and_then(|l| attr(l, "href"))
        .ok_or_else(|| "no download link in OA record".to_string())?;

    Ok(DownloadMetadata {
        url: ftp_to_https(&href),
        citation: attr(&record[1], "citation"),
        license: attr(&record[1], "license"),
    })
}

/// NCBI serves the same tree over HTTPS as over FTP.
pub fn ftp_to_https(url: &str) -> String {
    match url.strip_prefix("ftp://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

fn archive_file_name(url: &str, output: &Path) -> String {
    let last = url.rsplit('/').next().unwrap_or_default();
    let lower = last.to_ascii_lowercase();
    if lower.ends_with(".tar.gz") || lower.ends_with(".meca") {
        return last.to_string();
    }
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "article".to_string());
    format!("{stem}.tar.gz")
}

fn looks_like_jats(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(64 * 1024)];
    String::from_utf8_lossy(head).contains("<article")
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), Jats2SiteError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Jats2SiteError::io(parent, e))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| Jats2SiteError::io(path, e))
}
