//! The container runtime capability and the engine boundary it is built on.

use async_trait::async_trait;
use futures::stream::BoxStream;
use log::info;
use std::sync::Arc;

use crate::configuration::config::Config;
use crate::container_management::api_runtime::ApiRuntime;
use crate::container_management::cli_runtime::CliRuntime;
use crate::container_management::docker_api::DockerApi;
use crate::container_management::types::{
    CompletionResult, ContainerHandle, ContainerSpec, RuntimeKind,
};
use crate::error_handling::types::ContainerError;

/// Chunks of container output, in arrival order.
pub type LogStream<'a> = BoxStream<'a, Result<Vec<u8>, ContainerError>>;

/// Which parts of an instance's output to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    pub stdout: bool,
    pub stderr: bool,
    pub follow: bool,
    /// Number of trailing lines, or `"all"`.
    pub tail: String,
}

impl LogOptions {
    /// Combined stdout/stderr for the whole life of the instance.
    pub fn full_history() -> Self {
        Self {
            stdout: true,
            stderr: true,
            follow: true,
            tail: "all".to_string(),
        }
    }
}

/// Launches one container, waits for it and reports how it ended.
///
/// Implementations own the instance for the duration of the call and must
/// release it before returning, on every path. A non-zero exit is not an
/// `Err`: it comes back as a [`CompletionResult`] carrying diagnostics.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    fn kind(&self) -> RuntimeKind;

    async fn run(&self, spec: ContainerSpec) -> Result<CompletionResult, ContainerError>;
}

/// Programmatic engine operations used by [`ApiRuntime`].
///
/// `create` failures are launch errors; `start` and `wait` failures are
/// runtime errors. `remove` consumes the handle so an instance cannot be
/// released twice.
#[async_trait]
pub trait ContainerApi: Send + Sync {
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle, ContainerError>;

    async fn start(&self, handle: &ContainerHandle) -> Result<(), ContainerError>;

    /// Blocks until the instance terminates and returns its exit code.
    async fn wait(&self, handle: &ContainerHandle) -> Result<i64, ContainerError>;

    fn logs<'a>(&'a self, handle: &'a ContainerHandle, options: LogOptions) -> LogStream<'a>;

    async fn remove(&self, handle: ContainerHandle) -> Result<(), ContainerError>;
}

/// Builds the runtime selected by `config`.
///
/// Called once at process start; the returned handle is shared by every
/// build that runs in this process.
pub fn runtime_from_config(config: &Config) -> Result<Arc<dyn ContainerRuntime>, ContainerError> {
    let runtime: Arc<dyn ContainerRuntime> = match config.runtime {
        RuntimeKind::Api => {
            let api = DockerApi::connect(config.docker_host.as_deref())?;
            Arc::new(ApiRuntime::new(api).with_wait_timeout(config.wait_timeout()))
        }
        RuntimeKind::Cli => Arc::new(CliRuntime::new(&config.docker_binary)),
    };
    info!("Using {} container runtime", runtime.kind());
    Ok(runtime)
}
