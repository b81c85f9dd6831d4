//! Download stage: fetch the article into the workspace.

use crate::collab::{ArticleFetcher, FetchOptions};
use crate::error::Jats2SiteError;
use crate::target::ClassifiedTarget;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The article document as it landed in the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub path: PathBuf,
}

/// Where the fetched document for `target` is expected: `{stem}.xml`.
pub fn document_path(workspace: &Path, target: &ClassifiedTarget) -> PathBuf {
    workspace.join(format!("{}.xml", target.file_stem()))
}

/// Fetch `target` into the workspace.
///
/// `Ok(None)` when the fetcher ran but produced nothing; the caller decides
/// what that means. Fetcher errors propagate.
pub async fn fetch_document(
    fetcher: &dyn ArticleFetcher,
    workspace: &Path,
    target: &ClassifiedTarget,
    data: bool,
    archive_url: Option<String>,
) -> Result<Option<FetchedDocument>, Jats2SiteError> {
    let options = FetchOptions {
        output: document_path(workspace, target),
        data,
        archive_url,
    };
    fetcher.fetch(&target.target, &options).await?;

    let exists = tokio::fs::try_exists(&options.output)
        .await
        .map_err(|e| Jats2SiteError::io(&options.output, e))?;
    debug!(
        "Fetch of {} produced {}: {}",
        target.target,
        options.output.display(),
        exists
    );
    Ok(exists.then_some(FetchedDocument {
        path: options.output,
    }))
}
