//! Temporary per-page image files used in file mode.
//!
//! Each rendered page is written to `page.<n>.jpeg`, read back when the
//! output is composed, and deleted afterwards. When no directory is
//! configured, every run gets a fresh [`TempDir`], so concurrent runs never
//! collide and the directory itself disappears when the run ends.

use crate::error::ShrinkError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Deterministic file name for a page's temporary image.
pub fn artifact_name(page: usize) -> String {
    format!("page.{page}.jpeg")
}

/// Owner of the temporary page images created during one run.
#[derive(Debug)]
pub struct ArtifactDir {
    root: PathBuf,
    written: Vec<PathBuf>,
    // Kept alive so the directory outlives every artifact in it.
    _temp_dir: Option<TempDir>,
}

impl ArtifactDir {
    /// Use `configured` when given (created if missing), otherwise a fresh
    /// temporary directory.
    pub fn create(configured: Option<&Path>) -> Result<Self, ShrinkError> {
        match configured {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| ShrinkError::ArtifactIo {
                    path: dir.to_path_buf(),
                    source: e,
                })?;
                Ok(Self {
                    root: dir.to_path_buf(),
                    written: Vec::new(),
                    _temp_dir: None,
                })
            }
            None => {
                let temp_dir = tempfile::Builder::new()
                    .prefix("pdfshrink-")
                    .tempdir()
                    .map_err(|e| ShrinkError::ArtifactIo {
                        path: std::env::temp_dir(),
                        source: e,
                    })?;
                Ok(Self {
                    root: temp_dir.path().to_path_buf(),
                    written: Vec::new(),
                    _temp_dir: Some(temp_dir),
                })
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths written so far, in page order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.written
    }

    /// Write a page's image and remember its path.
    pub fn write(&mut self, page: usize, bytes: &[u8]) -> Result<PathBuf, ShrinkError> {
        let path = self.root.join(artifact_name(page));
        std::fs::write(&path, bytes).map_err(|e| ShrinkError::ArtifactIo {
            path: path.clone(),
            source: e,
        })?;
        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        self.written.push(path.clone());
        Ok(path)
    }

    /// Read every written image back, in page order.
    pub fn read_all(&self) -> Result<Vec<Vec<u8>>, ShrinkError> {
        self.written
            .iter()
            .map(|path| {
                std::fs::read(path).map_err(|e| ShrinkError::ArtifactIo {
                    path: path.clone(),
                    source: e,
                })
            })
            .collect()
    }

    /// Delete every written image. Best effort: failures are logged and
    /// counted, never returned as errors.
    pub fn cleanup(&mut self) -> usize {
        let failures = remove_artifacts(&self.written);
        self.written.clear();
        failures
    }
}

/// Delete each path, returning how many deletions failed.
pub fn remove_artifacts(paths: &[PathBuf]) -> usize {
    paths
        .iter()
        .filter(|path| match std::fs::remove_file(path) {
            Ok(()) => {
                debug!("Removed {}", path.display());
                false
            }
            Err(e) => {
                warn!("Could not remove temporary file {}: {}", path.display(), e);
                true
            }
        })
        .count()
}
