use crate::error::{Result, SwagError};
use crate::registry::ParseFlag;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Files found under a root, plus anything that could not be visited.
#[derive(Debug, Default)]
pub struct WalkResult {
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

/// Read-only view of a source tree.
pub trait SourceFs {
    /// Lists regular files under `root` in path order, without descending into
    /// directories rejected by `keep_dir` (the root itself is always visited).
    fn walk_files(&self, root: &Path, keep_dir: &dyn Fn(&Path) -> bool) -> Result<WalkResult>;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    fn is_file(&self, path: &Path) -> bool;
}

/// The real file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFs;

impl SourceFs for OsFs {
    fn walk_files(&self, root: &Path, keep_dir: &dyn Fn(&Path) -> bool) -> Result<WalkResult> {
        if !root.is_dir() {
            return Err(SwagError::io(
                root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            ));
        }
        let mut result = WalkResult::default();
        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.path() == root || !e.file_type().is_dir() || keep_dir(e.path()))
        {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() {
                        result.files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    result.warnings.push(warning);
                }
            }
        }
        Ok(result)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| SwagError::io(path, e))
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// An in-memory tree, handy for feeding sources that never touch the disk.
#[derive(Debug, Default, Clone)]
pub struct MemoryFs {
    files: BTreeMap<PathBuf, String>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl SourceFs for MemoryFs {
    fn walk_files(&self, root: &Path, keep_dir: &dyn Fn(&Path) -> bool) -> Result<WalkResult> {
        let mut result = WalkResult::default();
        for path in self.files.keys() {
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let mut dir = root.to_path_buf();
            let mut visible = true;
            if let Some(parent) = relative.parent() {
                for component in parent.components() {
                    dir.push(component);
                    if !keep_dir(&dir) {
                        visible = false;
                        break;
                    }
                }
            }
            if visible {
                result.files.push(path.clone());
            }
        }
        Ok(result)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            SwagError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            )
        })
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

/// One Go file discovered by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Import path of the package the file belongs to.
    pub package_path: String,
    pub flag: ParseFlag,
}

/// Result of a directory scan.
#[derive(Debug)]
pub struct ScanResult {
    pub module_path: String,
    pub go_files: Vec<SourceFile>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

/// Walks a search directory and assigns every `.go` file to its package.
///
/// Hidden directories, `testdata`, `_test.go` files and the configured
/// excludes are skipped. `vendor` is skipped unless vendored packages are
/// requested, in which case they are indexed for models only.
pub struct FileScanner {
    root_path: PathBuf,
    parse_vendor: bool,
    excludes: Vec<PathBuf>,
}

impl FileScanner {
    /// Creates a new `FileScanner` for the specified root directory.
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            parse_vendor: false,
            excludes: Vec::new(),
        }
    }

    pub fn with_vendor(mut self, parse_vendor: bool) -> Self {
        self.parse_vendor = parse_vendor;
        self
    }

    pub fn with_excludes(mut self, excludes: Vec<PathBuf>) -> Self {
        self.excludes = excludes;
        self
    }

    fn keep_dir(&self, dir: &Path) -> bool {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.len() > 1 && name.starts_with('.') {
            return false;
        }
        if name == "testdata" || (name == "vendor" && !self.parse_vendor) {
            return false;
        }
        !self
            .excludes
            .iter()
            .any(|ex| dir == ex || dir == self.root_path.join(ex))
    }

    /// Scans the directory tree and collects all Go source files.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be accessed.
    pub fn scan(&self, fs: &dyn SourceFs) -> Result<ScanResult> {
        let module_path = read_module_path(fs, &self.root_path);
        debug!(
            "Scanning {} as module {}",
            self.root_path.display(),
            module_path
        );
        let walk = fs.walk_files(&self.root_path, &|dir| self.keep_dir(dir))?;

        let mut go_files = Vec::new();
        for path in walk.files {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !file_name.ends_with(".go") || file_name.ends_with("_test.go") {
                continue;
            }
            let relative_dir: Vec<String> = path
                .strip_prefix(&self.root_path)
                .ok()
                .and_then(Path::parent)
                .map(|p| {
                    p.components()
                        .filter_map(|c| match c {
                            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                            _ => None,
                        })
                        .collect()
                })
                .unwrap_or_default();

            let (package_path, flag) = match relative_dir.iter().position(|c| c == "vendor") {
                Some(idx) => (relative_dir[idx + 1..].join("/"), ParseFlag::Models),
                None if relative_dir.is_empty() => (module_path.clone(), ParseFlag::All),
                None => (
                    format!("{}/{}", module_path, relative_dir.join("/")),
                    ParseFlag::All,
                ),
            };
            go_files.push(SourceFile {
                path,
                package_path,
                flag,
            });
        }

        Ok(ScanResult {
            module_path,
            go_files,
            warnings: walk.warnings,
        })
    }
}

/// Finds the module path for `dir` from the nearest `go.mod`, falling back to
/// the directory name when there is none.
pub fn read_module_path(fs: &dyn SourceFs, dir: &Path) -> String {
    let mut suffix: Vec<String> = Vec::new();
    let mut current = Some(dir);
    while let Some(candidate) = current {
        let go_mod = candidate.join("go.mod");
        if fs.is_file(&go_mod) {
            if let Ok(content) = fs.read_to_string(&go_mod) {
                if let Some(module) = parse_module_directive(&content) {
                    suffix.reverse();
                    let mut path = module;
                    for segment in suffix {
                        path.push('/');
                        path.push_str(&segment);
                    }
                    return path;
                }
            }
        }
        if let Some(name) = candidate.file_name() {
            suffix.push(name.to_string_lossy().into_owned());
        }
        current = candidate.parent();
    }
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_string())
}

fn parse_module_directive(go_mod: &str) -> Option<String> {
    go_mod.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let module = rest.trim().trim_matches('"');
        (!module.is_empty()).then(|| module.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_assigns_package_paths() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("go.mod"), "module github.com/acme/api\n\ngo 1.21\n").unwrap();
        fs::write(root.join("main.go"), "package main").unwrap();
        fs::create_dir_all(root.join("web")).unwrap();
        fs::write(root.join("web/handler.go"), "package web").unwrap();
        fs::write(root.join("web/handler_test.go"), "package web").unwrap();
        fs::write(root.join("readme.md"), "# README").unwrap();

        let scanner = FileScanner::new(root.to_path_buf());
        let result = scanner.scan(&OsFs).unwrap();

        assert_eq!(result.module_path, "github.com/acme/api");
        assert_eq!(result.go_files.len(), 2);
        assert!(result.warnings.is_empty());
        let packages: Vec<&str> = result
            .go_files
            .iter()
            .map(|f| f.package_path.as_str())
            .collect();
        assert_eq!(packages, vec!["github.com/acme/api", "github.com/acme/api/web"]);
    }

    #[test]
    fn test_scan_skips_hidden_testdata_and_vendor() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        for dir in [".git", "testdata", "vendor/github.com/x/y"] {
            fs::create_dir_all(root.join(dir)).unwrap();
            fs::write(root.join(dir).join("a.go"), "package a").unwrap();
        }
        fs::write(root.join("main.go"), "package main").unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan(&OsFs).unwrap();
        assert_eq!(result.go_files.len(), 1);

        let with_vendor = FileScanner::new(root.to_path_buf())
            .with_vendor(true)
            .scan(&OsFs)
            .unwrap();
        assert_eq!(with_vendor.go_files.len(), 2);
        let vendored = with_vendor
            .go_files
            .iter()
            .find(|f| f.flag == ParseFlag::Models)
            .unwrap();
        assert_eq!(vendored.package_path, "github.com/x/y");
    }

    #[test]
    fn test_scan_honours_excludes() {
        let fs = MemoryFs::new()
            .with_file("/src/go.mod", "module example.com/m")
            .with_file("/src/main.go", "package main")
            .with_file("/src/internal/gen/gen.go", "package gen")
            .with_file("/src/internal/api/api.go", "package api");
        let result = FileScanner::new(PathBuf::from("/src"))
            .with_excludes(vec![PathBuf::from("internal/gen")])
            .scan(&fs)
            .unwrap();
        let packages: Vec<&str> = result
            .go_files
            .iter()
            .map(|f| f.package_path.as_str())
            .collect();
        assert_eq!(packages, vec!["example.com/m/internal/api", "example.com/m"]);
    }

    #[test]
    fn test_module_path_from_parent_go_mod() {
        let fs = MemoryFs::new()
            .with_file("/repo/go.mod", "module \"example.com/repo\"\n")
            .with_file("/repo/services/api/main.go", "package main");
        assert_eq!(
            read_module_path(&fs, Path::new("/repo/services/api")),
            "example.com/repo/services/api"
        );
        assert_eq!(read_module_path(&fs, Path::new("/elsewhere/tool")), "tool");
    }

    #[test]
    fn test_scan_missing_root_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let scanner = FileScanner::new(temp_dir.path().join("missing"));
        assert!(scanner.scan(&OsFs).is_err());
    }
}
