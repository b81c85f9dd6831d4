//! Eligibility checks that run before any workspace exists.
//!
//! [`screen`] rejects targets that can never be processed from their shape
//! alone. [`check_pmc`] asks the fetcher for PMC download metadata and rejects
//! articles that are unknown, not open access, or not under an allowed
//! license.

use crate::collab::ArticleFetcher;
use crate::config::ServiceConfig;
use crate::error::{FailureKind, Rejection};
use crate::status::Provenance;
use crate::target::{ClassifiedTarget, TargetKind};
use tracing::{debug, warn};

/// What the eligibility check learned about an accepted PMC article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Eligibility {
    pub citation: Option<String>,
    pub license: Option<String>,
    /// Article package location, for fetching the full data.
    pub archive_url: Option<String>,
}

/// Reject targets whose shape alone rules them out.
pub fn screen(target: &ClassifiedTarget, config: &ServiceConfig) -> Result<(), Rejection> {
    let invalid = |message: String| {
        Rejection::new(FailureKind::Invalid, message)
            .with_provenance(Provenance::for_target(&target.target))
    };
    match target.kind {
        TargetKind::Opaque => Err(invalid(format!(
            "{}: Unrecognized article identifier",
            target.target
        ))),
        TargetKind::Pmc => Ok(()),
        _ if config.pmc_only => Err(invalid(format!("{}: Invalid PMC ID", target.target))),
        _ => Ok(()),
    }
}

/// Check that the PMC article `id` may be republished.
///
/// The DOI is only resolved when a rejection needs it.
pub async fn check_pmc(
    fetcher: &dyn ArticleFetcher,
    target: &str,
    id: &str,
    config: &ServiceConfig,
) -> Result<Eligibility, Rejection> {
    let metadata = match fetcher.download_metadata(id).await {
        Ok(m) => m,
        Err(e) => {
            debug!("Metadata lookup for {} failed: {}", id, e);
            return Err(match fetcher.pmcid_to_doi(id).await {
                Some(doi) => Rejection::new(
                    FailureKind::NonOa,
                    format!("{target}: PMC ID is not open access"),
                )
                .with_provenance(Provenance {
                    doi: Some(doi),
                    ..Provenance::default()
                }),
                None => Rejection::new(
                    FailureKind::NonPmc,
                    format!("{target}: PMC ID cannot be found"),
                ),
            });
        }
    };

    let allowed = metadata
        .license
        .as_deref()
        .is_some_and(|l| config.is_license_allowed(l));
    if !allowed {
        warn!("{} has license {:?}", id, metadata.license);
        let doi = fetcher.pmcid_to_doi(id).await;
        return Err(Rejection::new(
            FailureKind::NonCc,
            format!(
                "{id}: PMC article must be {} (License: {})",
                config.allowed_licenses.join(" or "),
                metadata.license.as_deref().unwrap_or("None")
            ),
        )
        .with_provenance(Provenance {
            target: None,
            doi,
            citation: metadata.citation,
            license: metadata.license,
        }));
    }

    Ok(Eligibility {
        citation: metadata.citation,
        license: metadata.license,
        archive_url: Some(metadata.url).filter(|u| !u.is_empty()),
    })
}
