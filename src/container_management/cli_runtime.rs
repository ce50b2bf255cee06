use async_trait::async_trait;
use log::{debug, error, info};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

use crate::container_management::runtime::ContainerRuntime;
use crate::container_management::types::{
    CompletionResult, ContainerSpec, Diagnostics, RuntimeKind,
};
use crate::error_handling::types::ContainerError;

/// Exit statuses `docker run` reserves for its own failures: 125 when the
/// daemon could not create or start the container, 126 when the command could
/// not be invoked, 127 when it was not found.
const LAUNCH_FAILURE_STATUSES: [i64; 3] = [125, 126, 127];

/// Runs containers by shelling out to `docker run --rm ...`.
///
/// Cleanup is delegated to the runtime's `--rm` flag. The child's captured
/// stdout and stderr serve as diagnostics when the run fails.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    binary: String,
}

impl CliRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// `run --rm [--privileged] (-v host:container)* (-e K=V)* image arg...`
    pub fn command_args(spec: &ContainerSpec) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string()];
        if spec.privileged {
            args.push("--privileged".to_string());
        }
        for bind in &spec.binds {
            args.push("-v".to_string());
            args.push(bind.to_string());
        }
        for pair in spec.env_pairs() {
            args.push("-e".to_string());
            args.push(pair);
        }
        args.push(spec.image.clone());
        args.extend(spec.args.iter().cloned());
        args
    }
}

/// Exit code of the child; death by signal maps to `128 + signal`.
fn exit_code_of(status: &ExitStatus) -> i64 {
    if let Some(code) = status.code() {
        return i64::from(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + i64::from(signal);
        }
    }
    -1
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Cli
    }

    async fn run(&self, spec: ContainerSpec) -> Result<CompletionResult, ContainerError> {
        let args = Self::command_args(&spec);
        info!("Running: {} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                error!("Failed to execute {}: {}", self.binary, e);
                if e.kind() == std::io::ErrorKind::NotFound {
                    ContainerError::RuntimeUnavailable(format!("{}: {}", self.binary, e))
                } else {
                    ContainerError::Launch(format!("running container {}: {}", spec.image, e))
                }
            })?;

        let exit_code = exit_code_of(&output.status);
        if exit_code == 0 {
            debug!("Container from image {} exited successfully", spec.image);
            return Ok(CompletionResult::success());
        }

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        let text = String::from_utf8_lossy(&combined).trim_end().to_string();

        if LAUNCH_FAILURE_STATUSES.contains(&exit_code) {
            error!(
                "Runtime could not launch image {} (status {}): {}",
                spec.image, exit_code, text
            );
            return Err(ContainerError::Launch(format!(
                "running container {} (status {}): {}",
                spec.image, exit_code, text
            )));
        }

        error!(
            "Container from image {} exit status non zero: {}",
            spec.image, exit_code
        );
        if !text.is_empty() {
            error!("Output of container from image {}:\n{}", spec.image, text);
        }
        Ok(CompletionResult::failed(
            exit_code,
            Diagnostics::Collected(combined),
        ))
    }
}
