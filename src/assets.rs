//! Documentation assets referenced by annotations.
//!
//! `@description.markdown` pulls text from a markdown directory and
//! `@x-codeSamples file` pulls JSON from a code-examples directory.

use crate::error::{Result, SwagError};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Source of markdown descriptions and code samples.
pub trait DocAssets {
    /// Markdown text stored as `<name>.md`.
    fn markdown(&self, name: &str) -> Result<String>;

    /// Code samples for the operation with this summary, stored as `<summary>.json`.
    fn code_samples(&self, summary: &str) -> Result<Vec<u8>>;
}

/// Reads assets from the configured directories.
#[derive(Debug, Clone, Default)]
pub struct DirAssets {
    markdown_dir: Option<PathBuf>,
    code_examples_dir: Option<PathBuf>,
}

impl DirAssets {
    pub fn new(markdown_dir: Option<PathBuf>, code_examples_dir: Option<PathBuf>) -> Self {
        Self {
            markdown_dir,
            code_examples_dir,
        }
    }
}

fn read_asset(dir: Option<&Path>, file_name: &str, what: &str) -> Result<Vec<u8>> {
    let dir = dir.ok_or_else(|| {
        SwagError::malformed(format!(
            "no {} directory is configured for {}",
            what, file_name
        ))
    })?;
    let path = dir.join(file_name);
    debug!("Reading {} asset {}", what, path.display());
    if !path.is_file() {
        return Err(SwagError::malformed(format!(
            "unable to find {} file {} in {}",
            what,
            file_name,
            dir.display()
        )));
    }
    fs::read(&path).map_err(|e| SwagError::io(path, e))
}

impl DocAssets for DirAssets {
    fn markdown(&self, name: &str) -> Result<String> {
        let bytes = read_asset(
            self.markdown_dir.as_deref(),
            &format!("{}.md", name),
            "markdown",
        )?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn code_samples(&self, summary: &str) -> Result<Vec<u8>> {
        read_asset(
            self.code_examples_dir.as_deref(),
            &format!("{}.json", summary),
            "code example",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reads_markdown_and_samples() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("api.md"), "# Pet store\n").unwrap();
        fs::write(dir.path().join("Add a pet.json"), "[]").unwrap();
        let assets = DirAssets::new(Some(dir.path().to_path_buf()), Some(dir.path().to_path_buf()));

        assert_eq!(assets.markdown("api").unwrap(), "# Pet store\n");
        assert_eq!(assets.code_samples("Add a pet").unwrap(), b"[]".to_vec());
    }

    #[test]
    fn test_missing_assets_are_malformed() {
        let dir = TempDir::new().unwrap();
        let assets = DirAssets::new(Some(dir.path().to_path_buf()), None);
        assert!(matches!(
            assets.markdown("users"),
            Err(SwagError::MalformedAnnotation { .. })
        ));
        assert!(matches!(
            assets.code_samples("anything"),
            Err(SwagError::MalformedAnnotation { .. })
        ));
    }
}
