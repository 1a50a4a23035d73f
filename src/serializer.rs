//! Serialization of the generated document to JSON or YAML.
//!
//! Every map in the document model is a `BTreeMap`, so both renderings have
//! a stable key order.

use crate::document::Swagger;
use anyhow::{bail, Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Output formats selectable with `--outputTypes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Json,
    Yaml,
}

impl OutputType {
    /// Parses a comma separated list such as `json,yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown formats or an empty list.
    pub fn parse_list(list: &str) -> Result<Vec<OutputType>> {
        let mut types = Vec::new();
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let output = match name.to_ascii_lowercase().as_str() {
                "json" => OutputType::Json,
                "yaml" | "yml" => OutputType::Yaml,
                other => bail!("unsupported output type: {}", other),
            };
            if !types.contains(&output) {
                types.push(output);
            }
        }
        if types.is_empty() {
            bail!("no output type given");
        }
        Ok(types)
    }

    /// File name written into the output directory.
    pub fn file_name(self) -> &'static str {
        match self {
            OutputType::Json => "swagger.json",
            OutputType::Yaml => "swagger.yaml",
        }
    }

    pub fn serialize(self, doc: &Swagger) -> Result<String> {
        match self {
            OutputType::Json => serialize_json(doc),
            OutputType::Yaml => serialize_yaml(doc),
        }
    }
}

/// Serializes a Swagger document to YAML format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_yaml(doc: &Swagger) -> Result<String> {
    debug!("Serializing Swagger document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize Swagger document to YAML")
}

/// Serializes a Swagger document to JSON format with pretty printing.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json(doc: &Swagger) -> Result<String> {
    debug!("Serializing Swagger document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize Swagger document to JSON")
}

/// Writes string content to a file.
///
/// Creates the file if it doesn't exist, or overwrites it if it does.
/// Missing parent directories are created.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
