use crate::error::{Result, SwagError};
use crate::registry::ParseFlag;
use crate::scanner::{SourceFile, SourceFs};
use crate::syntax::{self, ast::GoFile};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Parser for Go source files.
///
/// Reads each file through a [`SourceFs`] and turns it into a [`GoFile`]
/// syntax tree carrying declarations, imports and comments.
pub struct AstParser;

/// A successfully parsed Go file with its syntax tree.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// Import path of the package the file belongs to
    pub package_path: String,
    pub flag: ParseFlag,
    /// The parsed syntax tree
    pub syntax_tree: GoFile,
}

impl ParsedFile {
    /// Builds a parsed unit straight from source text.
    ///
    /// # Errors
    ///
    /// Returns [`SwagError::Syntax`] if the source does not parse.
    pub fn from_source(
        path: impl Into<PathBuf>,
        package_path: impl Into<String>,
        flag: ParseFlag,
        source: &str,
    ) -> Result<Self> {
        let path = path.into();
        let syntax_tree = syntax::parse_file(source).map_err(|source| SwagError::Syntax {
            file: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            package_path: package_path.into(),
            flag,
            syntax_tree,
        })
    }

    pub fn package_name(&self) -> &str {
        &self.syntax_tree.package_name
    }
}

impl AstParser {
    /// Parses a single Go source file.
    ///
    /// # Arguments
    ///
    /// * `fs` - File system the source is read from
    /// * `file` - The file and the package it was assigned to by the scanner
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file contains invalid Go syntax
    pub fn parse_file(fs: &dyn SourceFs, file: &SourceFile) -> Result<ParsedFile> {
        debug!("Parsing file: {}", file.path.display());
        let content = fs.read_to_string(&file.path)?;
        let parsed = ParsedFile::from_source(&file.path, &file.package_path, file.flag, &content)?;
        debug!(
            "Parsed {} declarations in {}",
            parsed.syntax_tree.decls.len(),
            file.path.display()
        );
        Ok(parsed)
    }

    /// Parses multiple Go source files, reporting each outcome.
    ///
    /// # Returns
    ///
    /// One `Result` per input, in input order.
    pub fn parse_files(fs: &dyn SourceFs, files: &[SourceFile]) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} files", files.len());

        let results: Vec<Result<ParsedFile>> = files
            .iter()
            .map(|file| match Self::parse_file(fs, file) {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {}", file.path.display(), e);
                    Err(e)
                }
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }

    /// Parses every file, stopping at the first failure.
    pub fn parse_all(fs: &dyn SourceFs, files: &[SourceFile]) -> Result<Vec<ParsedFile>> {
        Self::parse_files(fs, files).into_iter().collect()
    }
}

/// Returns `true` for paths that live under `root`.
pub fn is_under(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::MemoryFs;

    fn source_file(path: &str, package: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(path),
            package_path: package.to_string(),
            flag: ParseFlag::All,
        }
    }

    #[test]
    fn test_parse_valid_go_file() {
        let fs = MemoryFs::new().with_file(
            "/m/web/pet.go",
            "package web\n\ntype Pet struct {\n\tID int `json:\"id\"`\n}\n\nfunc List() {}\n",
        );
        let parsed = AstParser::parse_file(&fs, &source_file("/m/web/pet.go", "m/web")).unwrap();
        assert_eq!(parsed.package_name(), "web");
        assert_eq!(parsed.package_path, "m/web");
        assert_eq!(parsed.syntax_tree.decls.len(), 2);
    }

    #[test]
    fn test_parse_invalid_go_file() {
        let fs = MemoryFs::new().with_file("/m/broken.go", "package main\nfunc broken( {\n");
        let err = AstParser::parse_file(&fs, &source_file("/m/broken.go", "m")).unwrap_err();
        assert!(matches!(err, SwagError::Syntax { .. }));
    }

    #[test]
    fn test_parse_nonexistent_file() {
        let fs = MemoryFs::new();
        let err = AstParser::parse_file(&fs, &source_file("/m/none.go", "m")).unwrap_err();
        assert!(matches!(err, SwagError::Io { .. }));
    }

    #[test]
    fn test_parse_files_batch() {
        let fs = MemoryFs::new()
            .with_file("/m/a.go", "package m\n")
            .with_file("/m/b.go", "package m\ntype X struct {\n");
        let files = vec![source_file("/m/a.go", "m"), source_file("/m/b.go", "m")];
        let results = AstParser::parse_files(&fs, &files);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(AstParser::parse_all(&fs, &files).is_err());
    }

    #[test]
    fn test_is_under() {
        assert!(is_under(Path::new("/usr/go/src/fmt/print.go"), Path::new("/usr/go")));
        assert!(!is_under(Path::new("/src/fmt.go"), Path::new("/usr/go")));
    }
}
