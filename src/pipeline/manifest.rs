//! Amend the generated project manifest before the site build reads it.

use crate::error::Jats2SiteError;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// PDF files sitting directly in `workspace`, sorted by name.
pub async fn discover_pdfs(workspace: &Path) -> Result<Vec<String>, Jats2SiteError> {
    let workspace = workspace.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let entries =
            std::fs::read_dir(&workspace).map_err(|e| Jats2SiteError::io(&workspace, e))?;
        let mut pdfs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Jats2SiteError::io(&workspace, e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_file && name.to_ascii_lowercase().ends_with(".pdf") {
                pdfs.push(name);
            }
        }
        pdfs.sort();
        Ok(pdfs)
    })
    .await
    .map_err(|e| Jats2SiteError::Internal(format!("pdf scan task: {e}")))?
}

/// Inject the site template and downloadable PDFs into the manifest at `path`.
///
/// Existing `project.downloads` entries are kept; PDFs are appended as
/// `{url}`. A lone PDF is also renamed to `{id}.pdf` for readers.
pub async fn amend_manifest(
    path: &Path,
    template: &str,
    pdfs: &[String],
    id: &str,
) -> Result<(), Jats2SiteError> {
    let manifest_err = |reason: String| Jats2SiteError::Manifest {
        path: path.to_path_buf(),
        reason,
    };

    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Jats2SiteError::io(path, e))?;
    let mut doc: Value = if text.trim().is_empty() {
        Value::Mapping(Mapping::new())
    } else {
        serde_yaml::from_str(&text).map_err(|e| manifest_err(e.to_string()))?
    };
    let root = doc
        .as_mapping_mut()
        .ok_or_else(|| manifest_err("top level is not a mapping".to_string()))?;

    let project = child_mapping(root, "project").map_err(manifest_err)?;
    let downloads = project
        .entry(Value::from("downloads"))
        .or_insert_with(|| Value::Sequence(Vec::new()));
    if downloads.is_null() {
        *downloads = Value::Sequence(Vec::new());
    }
    let list = downloads
        .as_sequence_mut()
        .ok_or_else(|| manifest_err("project.downloads is not a list".to_string()))?;
    let filename = (pdfs.len() == 1).then(|| format!("{id}.pdf"));
    for pdf in pdfs {
        let mut entry = Mapping::new();
        entry.insert(Value::from("url"), Value::from(pdf.as_str()));
        if let Some(ref name) = filename {
            entry.insert(Value::from("filename"), Value::from(name.as_str()));
        }
        list.push(Value::Mapping(entry));
    }

    let site = child_mapping(root, "site").map_err(manifest_err)?;
    site.insert(Value::from("template"), Value::from(template));

    let out = serde_yaml::to_string(&doc).map_err(|e| manifest_err(e.to_string()))?;
    tokio::fs::write(path, out)
        .await
        .map_err(|e| Jats2SiteError::io(path, e))
}

/// Path of the manifest inside a workspace.
pub fn manifest_path(workspace: &Path, manifest_file: &Path) -> PathBuf {
    workspace.join(manifest_file)
}

fn child_mapping<'a>(parent: &'a mut Mapping, key: &str) -> Result<&'a mut Mapping, String> {
    let value = parent
        .entry(Value::from(key))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if value.is_null() {
        *value = Value::Mapping(Mapping::new());
    }
    value
        .as_mapping_mut()
        .ok_or_else(|| format!("`{key}` is not a mapping"))
}
