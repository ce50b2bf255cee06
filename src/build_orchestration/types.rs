use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Input of one boot-creator build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub kernel_path: PathBuf,
    pub cmdline: String,
}

impl BuildRequest {
    pub fn new(kernel_path: impl Into<PathBuf>, cmdline: impl Into<String>) -> Self {
        Self {
            kernel_path: kernel_path.into(),
            cmdline: cmdline.into(),
        }
    }
}

/// Outcome of a successful build. `image_path` lives outside any staging
/// area and belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    pub build_id: Uuid,
    pub image_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Lifecycle of one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Kernel copied into the staging area.
    Staged,
    /// Builder container launched.
    Running,
    /// Builder exited 0 and the image was moved out of the staging area.
    Succeeded,
    /// Builder exited with a non-zero status.
    FailedNonZero,
    /// No exit status could be obtained, or the result could not be extracted.
    FailedLaunch,
    /// Staging area removed. Terminal.
    Cleaned,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Staged => "staged",
            BuildState::Running => "running",
            BuildState::Succeeded => "succeeded",
            BuildState::FailedNonZero => "failed (non-zero exit)",
            BuildState::FailedLaunch => "failed (launch)",
            BuildState::Cleaned => "cleaned",
        };
        f.write_str(name)
    }
}
