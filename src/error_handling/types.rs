use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(String),
    #[error("Invalid environment variable name: {0}")]
    InvalidEnvKey(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Failures while creating, populating or removing a staging area.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Failed to create staging directory under {}: {source}", .base.display())]
    TempDir {
        base: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to remove staging directory {}: {source}", .path.display())]
    Teardown {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures reported by a container runtime.
///
/// `RuntimeUnavailable` and `Launch` happen before any instance ran.
/// `Runtime` and `NonZeroExit` happen once an instance exists.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Container runtime not available: {0}")]
    RuntimeUnavailable(String),
    #[error("Container launch failed: {0}")]
    Launch(String),
    #[error("Container runtime error: {0}")]
    Runtime(String),
    #[error("Container exited with non zero status {exit_code}{}", render_logs(.logs))]
    NonZeroExit { exit_code: i64, logs: Option<String> },
}

impl ContainerError {
    /// True when the failure happened before an instance could run.
    pub fn is_launch(&self) -> bool {
        matches!(
            self,
            ContainerError::RuntimeUnavailable(_) | ContainerError::Launch(_)
        )
    }

    /// Reclassifies a failure that happened while creating an instance as a launch error.
    pub fn into_launch(self) -> Self {
        match self {
            ContainerError::Runtime(msg) => ContainerError::Launch(msg),
            other => other,
        }
    }

    /// Reclassifies a failure that happened after creation as a runtime error.
    pub fn into_runtime(self) -> Self {
        match self {
            ContainerError::RuntimeUnavailable(msg) | ContainerError::Launch(msg) => {
                ContainerError::Runtime(msg)
            }
            other => other,
        }
    }
}

fn render_logs(logs: &Option<String>) -> String {
    match logs {
        Some(text) if !text.trim().is_empty() => format!("\n--- container output ---\n{}", text.trim_end()),
        _ => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error("Failed to produce result file {}: {source}", .path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
