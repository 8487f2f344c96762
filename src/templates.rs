//! Reference Terraform templates loaded from disk.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::labels::ResourceLabel;

/// File extension recognised as a reference template.
pub const TEMPLATE_EXTENSION: &str = "tf";

/// One reference configuration file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDocument {
    /// Full file contents.
    pub content: String,
    /// File name the template was read from (e.g. `storage.tf`).
    pub source: String,
    /// File stem, taken verbatim as the resource-type label.
    pub label: String,
}

impl TemplateDocument {
    /// Parsed label when the stem is one of the known resource types.
    pub fn resource_label(&self) -> Option<ResourceLabel> {
        ResourceLabel::parse(&self.label)
    }
}

/// Immutable set of templates read once at startup.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
    documents: Vec<TemplateDocument>,
}

impl TemplateStore {
    /// Reads every `.tf` file directly inside `dir`, in file-name order.
    ///
    /// A missing directory is a configuration error; a directory without
    /// templates yields an empty store.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(EngineError::Configuration(format!(
                "Template directory not found: {}",
                dir.display()
            )));
        }

        let entries = fs::read_dir(dir).map_err(|err| {
            EngineError::Configuration(format!(
                "failed to list template directory {}: {err}",
                dir.display()
            ))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| {
                EngineError::Configuration(format!(
                    "failed to read entry in {}: {err}",
                    dir.display()
                ))
            })?;
            let path = entry.path();
            if path.is_file() && is_template(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let document = read_template(&path)?;
            if document.resource_label().is_none() {
                warn!(
                    source = %document.source,
                    label = %document.label,
                    "template label is not a known resource type; it will never be retrieved"
                );
            }
            debug!(source = %document.source, bytes = document.content.len(), "loaded template");
            documents.push(document);
        }

        info!(
            dir = %dir.display(),
            templates = documents.len(),
            "template store loaded"
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            documents,
        })
    }

    /// Directory the store was loaded from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Loaded templates.
    pub fn documents(&self) -> &[TemplateDocument] {
        &self.documents
    }

    /// Number of loaded templates.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// True when the directory held no templates.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn is_template(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == TEMPLATE_EXTENSION)
}

fn read_template(path: &Path) -> Result<TemplateDocument> {
    let content = fs::read_to_string(path).map_err(|err| {
        EngineError::Configuration(format!("failed to read template {}: {err}", path.display()))
    })?;
    let source = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let label = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(TemplateDocument {
        content,
        source,
        label,
    })
}
