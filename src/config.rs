use anyhow::{bail, Context, Result};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How struct field names are turned into property names when no `json` tag renames them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropNamingStrategy {
    #[default]
    CamelCase,
    SnakeCase,
    PascalCase,
}

impl PropNamingStrategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "camelcase" => Some(Self::CamelCase),
            "snakecase" => Some(Self::SnakeCase),
            "pascalcase" => Some(Self::PascalCase),
            _ => None,
        }
    }

    pub fn apply(self, field_name: &str) -> String {
        match self {
            Self::CamelCase => crate::text::to_lower_camel_case(field_name),
            Self::SnakeCase => crate::text::to_snake_case(field_name),
            Self::PascalCase => field_name.to_string(),
        }
    }
}

/// Operation filter built from a comma separated list; `!tag` excludes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl TagFilter {
    pub fn parse(list: &str) -> Self {
        let mut filter = Self::default();
        for tag in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match tag.strip_prefix('!') {
                Some(excluded) => {
                    filter.exclude.insert(excluded.to_string());
                }
                None => {
                    filter.include.insert(tag.to_string());
                }
            }
        }
        filter
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// An operation passes when none of its tags is excluded and, if an
    /// allow-list is present, at least one of them is allowed.
    pub fn allows(&self, tags: &[String]) -> bool {
        if tags.iter().any(|t| self.exclude.contains(t)) {
            return false;
        }
        self.include.is_empty() || tags.iter().any(|t| self.include.contains(t))
    }
}

/// Everything that influences how a source tree is turned into a document.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub naming_strategy: PropNamingStrategy,
    pub strict: bool,
    pub required_by_default: bool,
    pub parse_dependency: bool,
    pub parse_vendor: bool,
    pub parse_internal: bool,
    /// Directories (absolute or relative to a search dir) that are not scanned.
    pub excludes: Vec<PathBuf>,
    pub markdown_dir: Option<PathBuf>,
    pub code_examples_dir: Option<PathBuf>,
    /// Collection format applied to query arrays when none is given.
    pub collection_format_in_query: String,
    /// `type -> replacement`; an empty replacement skips the type.
    pub overrides: BTreeMap<String, String>,
    pub tags: TagFilter,
    /// Files below this directory never yield operations or definitions.
    pub goroot: Option<PathBuf>,
    pub dependency_timeout: Duration,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            naming_strategy: PropNamingStrategy::CamelCase,
            strict: false,
            required_by_default: false,
            parse_dependency: false,
            parse_vendor: false,
            parse_internal: false,
            excludes: Vec::new(),
            markdown_dir: None,
            code_examples_dir: None,
            collection_format_in_query: "csv".to_string(),
            overrides: BTreeMap::new(),
            tags: TagFilter::default(),
            goroot: None,
            dependency_timeout: Duration::from_secs(120),
        }
    }
}

impl ParserConfig {
    pub fn with_naming_strategy(mut self, strategy: PropNamingStrategy) -> Self {
        self.naming_strategy = strategy;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_required_by_default(mut self, required: bool) -> Self {
        self.required_by_default = required;
        self
    }

    pub fn with_parse_dependency(mut self, parse: bool) -> Self {
        self.parse_dependency = parse;
        self
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_tags(mut self, tags: TagFilter) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_markdown_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.markdown_dir = Some(dir.into());
        self
    }

    pub fn with_code_examples_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.code_examples_dir = Some(dir.into());
        self
    }
}

/// Reads a `.swaggo` overrides file.
///
/// Each non-empty line is either `replace <type> <replacement>` or
/// `skip <type>`; lines starting with `//` are comments.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a line has another shape.
pub fn load_overrides_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read overrides file: {}", path.display()))?;
    let overrides = parse_overrides(&content)
        .with_context(|| format!("Invalid overrides file: {}", path.display()))?;
    debug!("Loaded {} overrides from {}", overrides.len(), path.display());
    Ok(overrides)
}

pub fn parse_overrides(content: &str) -> Result<BTreeMap<String, String>> {
    let mut overrides = BTreeMap::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["skip", ty] => {
                overrides.insert(ty.to_string(), String::new());
            }
            ["replace", ty, replacement] => {
                overrides.insert(ty.to_string(), replacement.to_string());
            }
            _ => bail!("line {}: invalid override {:?}", idx + 1, line),
        }
    }
    Ok(overrides)
}
