//! Dependency discovery for `--parseDependency`.
//!
//! The builder only needs the list of packages a module depends on and the
//! Go files in each. [`GoListCommand`] asks the Go toolchain; tests inject
//! their own [`DependencyLister`].

use crate::error::{Result, SwagError};
use log::{debug, info};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// One package reported by the lister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyPackage {
    pub import_path: String,
    pub name: String,
    pub dir: PathBuf,
    /// Absolute paths of the package's non-test Go files.
    pub go_files: Vec<PathBuf>,
    /// Part of the standard library.
    pub standard: bool,
}

pub trait DependencyLister {
    /// Lists the packages reachable from the module rooted at `root`.
    fn list(&self, root: &Path) -> Result<Vec<DependencyPackage>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GoListPackage {
    #[serde(default)]
    dir: String,
    #[serde(default)]
    import_path: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    go_files: Vec<String>,
    #[serde(default)]
    goroot: bool,
    #[serde(default)]
    standard: bool,
}

/// Parses the stream of JSON objects printed by `go list -json`.
pub fn parse_go_list_output(output: &[u8]) -> Result<Vec<DependencyPackage>> {
    let mut packages = Vec::new();
    for package in serde_json::Deserializer::from_slice(output).into_iter::<GoListPackage>() {
        let package =
            package.map_err(|e| SwagError::Dependency(format!("invalid go list output: {}", e)))?;
        let dir = PathBuf::from(&package.dir);
        packages.push(DependencyPackage {
            go_files: package.go_files.iter().map(|f| dir.join(f)).collect(),
            import_path: package.import_path,
            name: package.name,
            dir,
            standard: package.standard || package.goroot,
        });
    }
    Ok(packages)
}

/// Runs `go list -json -e -deps ./...` in the search root.
#[derive(Debug, Clone)]
pub struct GoListCommand {
    program: String,
    timeout: Duration,
}

impl GoListCommand {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "go".to_string(),
            timeout,
        }
    }

    /// Use another executable in place of `go`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send(buf);
    });
    rx
}

impl DependencyLister for GoListCommand {
    fn list(&self, root: &Path) -> Result<Vec<DependencyPackage>> {
        info!("Listing dependencies of {}", root.display());
        let mut child = Command::new(&self.program)
            .args(["list", "-json", "-e", "-deps", "./..."])
            .current_dir(root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SwagError::Dependency(format!("failed to run {}: {}", self.program, e)))?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => return Err(SwagError::Dependency(format!("go list failed: {}", e))),
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SwagError::Dependency(format!(
                    "go list timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
            thread::sleep(Duration::from_millis(20));
        };

        let stdout = stdout.recv().unwrap_or_default();
        if !status.success() {
            let stderr = stderr.recv().unwrap_or_default();
            return Err(SwagError::Dependency(format!(
                "go list exited with {}: {}",
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        let packages = parse_go_list_output(&stdout)?;
        debug!("go list reported {} packages", packages.len());
        Ok(packages)
    }
}
