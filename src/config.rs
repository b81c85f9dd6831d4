//! Configuration for the conversion service.
//!
//! All orchestrator behaviour is controlled through [`ServiceConfig`], built
//! via its [`ServiceConfigBuilder`]. Collaborator-specific knobs (HTTP
//! endpoints, external command lines) live with the collaborators in
//! [`crate::collab`].

use crate::error::Jats2SiteError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Licenses an article must carry to be republished.
pub const DEFAULT_ALLOWED_LICENSES: &[&str] = &["CC BY", "CC0"];

/// Site template injected into every generated manifest.
pub const DEFAULT_SITE_TEMPLATE: &str = "/usr/app/theme";

/// Configuration for the job orchestrator.
///
/// # Example
/// ```rust
/// use jats2site::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .storage_folder("2024.11.15")
///     .pmc_only(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.prefix_for("PMC1"), "2024.11.15/PMC1/");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Top-level folder in the bucket under which every job prefix lives.
    /// Default: `convert-service`.
    pub storage_folder: String,

    /// Directory under which per-job workspaces are created. Default: OS temp dir.
    pub scratch_dir: PathBuf,

    /// Template identifier written to `site.template` in the manifest.
    pub site_template: String,

    /// Licenses accepted for PMC targets. Compared verbatim.
    pub allowed_licenses: Vec<String>,

    /// Only accept `PMC<digits>` targets; anything else fails as `invalid`.
    pub pmc_only: bool,

    /// Ask the fetcher for the full data package (archive) as well as the XML.
    pub fetch_data: bool,

    /// Build root, relative to the workspace. Measured for the log record.
    pub build_root: PathBuf,

    /// Site output tree, relative to the workspace. Uploaded verbatim.
    pub site_output: PathBuf,

    /// Project manifest amended between `init` and `build`.
    pub manifest_file: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage_folder: "convert-service".to_string(),
            scratch_dir: std::env::temp_dir(),
            site_template: DEFAULT_SITE_TEMPLATE.to_string(),
            allowed_licenses: DEFAULT_ALLOWED_LICENSES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            pmc_only: false,
            fetch_data: true,
            build_root: PathBuf::from("_build"),
            site_output: PathBuf::from("_build/site"),
            manifest_file: PathBuf::from("myst.yml"),
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Storage prefix owning every artifact of job `id`: `{folder}/{id}/`.
    pub fn prefix_for(&self, id: &str) -> String {
        format!("{}/{}/", self.storage_folder, id)
    }

    pub fn is_license_allowed(&self, license: &str) -> bool {
        self.allowed_licenses.iter().any(|l| l == license)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn storage_folder(mut self, folder: impl Into<String>) -> Self {
        self.config.storage_folder = folder.into().trim_matches('/').to_string();
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = dir.into();
        self
    }

    pub fn site_template(mut self, template: impl Into<String>) -> Self {
        self.config.site_template = template.into();
        self
    }

    pub fn allowed_licenses<I, S>(mut self, licenses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_licenses = licenses.into_iter().map(Into::into).collect();
        self
    }

    pub fn pmc_only(mut self, v: bool) -> Self {
        self.config.pmc_only = v;
        self
    }

    pub fn fetch_data(mut self, v: bool) -> Self {
        self.config.fetch_data = v;
        self
    }

    pub fn build_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.build_root = dir.into();
        self
    }

    pub fn site_output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.site_output = dir.into();
        self
    }

    pub fn manifest_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.config.manifest_file = file.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, Jats2SiteError> {
        let c = &self.config;
        if c.storage_folder.is_empty() {
            return Err(Jats2SiteError::InvalidConfig(
                "storage folder must not be empty".into(),
            ));
        }
        if c.allowed_licenses.is_empty() {
            return Err(Jats2SiteError::InvalidConfig(
                "at least one license must be allowed".into(),
            ));
        }
        for (name, path) in [
            ("build root", &c.build_root),
            ("site output", &c.site_output),
            ("manifest file", &c.manifest_file),
        ] {
            if !is_plain_relative(path) {
                return Err(Jats2SiteError::InvalidConfig(format!(
                    "{name} must be a relative path inside the workspace, got {}",
                    path.display()
                )));
            }
        }
        Ok(self.config)
    }
}

fn is_plain_relative(path: &Path) -> bool {
    use std::path::Component;
    !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}
