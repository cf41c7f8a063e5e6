//! Scratch area for encoder output.
//!
//! The configured scratch directory is only a parent. Every run stages its
//! output in its own `run-*` temporary directory below it, removed when the
//! run drops its [`RunScratch`]. Runs in other processes, or other
//! orchestrators sharing the same parent, never see each other's files.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Parent directory for per-run staging directories.
#[derive(Debug, Clone)]
pub struct ScratchArea {
    root: PathBuf,
}

impl ScratchArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path to the scratch parent directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh staging directory for one run.
    ///
    /// `destination` is the local directory results are published into, if
    /// any. A scratch root equal to it, or containing it, is refused.
    pub fn begin_run(&self, destination: Option<&Path>) -> pf_core::Result<RunScratch> {
        std::fs::create_dir_all(&self.root)?;
        if let Some(destination) = destination {
            self.check_disjoint(destination)?;
        }

        let dir = tempfile::Builder::new()
            .prefix("run-")
            .tempdir_in(&self.root)?;
        tracing::debug!("Staging in {}", dir.path().display());
        Ok(RunScratch { dir })
    }

    /// Fail when publishing into `destination` would land inside the
    /// scratch root.
    pub fn check_disjoint(&self, destination: &Path) -> pf_core::Result<()> {
        let root = canonical(&self.root);
        let destination = canonical(destination);
        if destination.starts_with(&root) {
            return Err(pf_core::Error::Config(format!(
                "scratch directory {} must not contain the output destination {}",
                self.root.display(),
                destination.display()
            )));
        }
        Ok(())
    }
}

/// Resolve symlinks and `..` where the path exists; otherwise keep it as is.
fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Staging directory owned by one run. Deleted on drop.
#[derive(Debug)]
pub struct RunScratch {
    dir: TempDir,
}

impl RunScratch {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Staging path for a generated output file name.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.path().join(file_name)
    }
}
