use log::{debug, error, warn};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error_handling::types::StagingError;

/// Name the kernel binary is given inside the staging area.
pub const KERNEL_FILE_NAME: &str = "program.bin";

const STAGING_PREFIX: &str = "stage";

/// Ephemeral directory owned by exactly one build.
///
/// The directory is removed by [`StagingArea::teardown`]. If the area is
/// dropped without an explicit teardown (early return, panic unwinding), the
/// directory is removed on drop instead.
#[derive(Debug)]
pub struct StagingArea {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl StagingArea {
    /// Creates a unique directory under `base` and copies `kernel_path` into it
    /// as [`KERNEL_FILE_NAME`].
    ///
    /// `base` is created if it does not exist yet. When the copy fails the
    /// freshly created directory is removed before the error is returned.
    pub fn prepare(base: &Path, kernel_path: &Path) -> Result<Self, StagingError> {
        fs::create_dir_all(base).map_err(|e| {
            error!("Failed to create staging base {}: {}", base.display(), e);
            StagingError::TempDir {
                base: base.to_path_buf(),
                source: e,
            }
        })?;

        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(base)
            .map_err(|e| {
                error!("Failed to create staging directory in {}: {}", base.display(), e);
                StagingError::TempDir {
                    base: base.to_path_buf(),
                    source: e,
                }
            })?;

        let target = dir.path().join(KERNEL_FILE_NAME);
        fs::copy(kernel_path, &target).map_err(|e| {
            error!(
                "Failed to stage kernel {} into {}: {}",
                kernel_path.display(),
                target.display(),
                e
            );
            StagingError::Copy {
                from: kernel_path.to_path_buf(),
                to: target.clone(),
                source: e,
            }
        })?;

        let path = dir.path().to_path_buf();
        debug!("Staged {} into {}", kernel_path.display(), path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    /// Host path of the staging directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recursively removes the staging directory.
    pub fn teardown(mut self) -> Result<(), StagingError> {
        match self.dir.take() {
            Some(dir) => {
                debug!("Tearing down staging area {}", self.path.display());
                dir.close().map_err(|e| StagingError::Teardown {
                    path: self.path.clone(),
                    source: e,
                })
            }
            None => Ok(()),
        }
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            warn!(
                "Staging area {} dropped without teardown, removing it",
                self.path.display()
            );
            if let Err(e) = dir.close() {
                warn!(
                    "Failed to remove staging area {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}
