//! [`ContainerApi`] over the Docker Engine API.

use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::models::HostConfig;
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::StreamExt;
use log::{debug, error};

use crate::container_management::runtime::{ContainerApi, LogOptions, LogStream};
use crate::container_management::types::{ContainerHandle, ContainerSpec};
use crate::error_handling::types::ContainerError;

const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Engine client. Construct it once and share it.
#[derive(Debug, Clone)]
pub struct DockerApi {
    docker: Docker,
}

impl DockerApi {
    /// Connects to `host` (`unix://...`, `tcp://...` or `http://...`), or to
    /// the local defaults (`DOCKER_HOST`, then the platform socket) when unset.
    pub fn connect(host: Option<&str>) -> Result<Self, ContainerError> {
        let docker = match host {
            None => Docker::connect_with_local_defaults(),
            Some(addr) if addr.starts_with("unix://") => {
                Docker::connect_with_socket(addr, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            Some(addr) => Docker::connect_with_http(addr, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION),
        }
        .map_err(|e| {
            error!("Failed to set up docker client: {}", e);
            ContainerError::RuntimeUnavailable(e.to_string())
        })?;

        debug!("Docker client configured ({})", host.unwrap_or("local defaults"));
        Ok(Self { docker })
    }
}

/// Engine request body for `spec`. An empty argument list keeps the image's
/// own command.
fn container_config(spec: &ContainerSpec) -> ContainerConfig<String> {
    ContainerConfig {
        image: Some(spec.image.clone()),
        cmd: (!spec.args.is_empty()).then(|| spec.args.clone()),
        env: (!spec.env.is_empty()).then(|| spec.env_pairs()),
        host_config: Some(HostConfig {
            binds: Some(spec.bind_strings()),
            privileged: Some(spec.privileged),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl ContainerApi for DockerApi {
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle, ContainerError> {
        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, container_config(spec))
            .await
            .map_err(|e| ContainerError::Launch(e.to_string()))?;

        for warning in &response.warnings {
            debug!("Engine warning for container {}: {}", response.id, warning);
        }
        Ok(ContainerHandle::new(response.id))
    }

    async fn start(&self, handle: &ContainerHandle) -> Result<(), ContainerError> {
        self.docker
            .start_container(handle.id(), None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| ContainerError::Runtime(e.to_string()))
    }

    async fn wait(&self, handle: &ContainerHandle) -> Result<i64, ContainerError> {
        let mut responses = std::pin::pin!(self
            .docker
            .wait_container(handle.id(), None::<WaitContainerOptions<String>>));

        match responses.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // The client reports non-zero exits as an error value carrying the code.
            Some(Err(DockerError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(ContainerError::Runtime(e.to_string())),
            None => Err(ContainerError::Runtime(format!(
                "wait for container {} ended without a status",
                handle
            ))),
        }
    }

    fn logs<'a>(&'a self, handle: &'a ContainerHandle, options: LogOptions) -> LogStream<'a> {
        let options = LogsOptions::<String> {
            stdout: options.stdout,
            stderr: options.stderr,
            follow: options.follow,
            tail: options.tail,
            ..Default::default()
        };

        self.docker
            .logs(handle.id(), Some(options))
            .map(|frame| {
                frame
                    .map(|output| output.into_bytes().to_vec())
                    .map_err(|e| ContainerError::Runtime(e.to_string()))
            })
            .boxed()
    }

    async fn remove(&self, handle: ContainerHandle) -> Result<(), ContainerError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(handle.id(), Some(options))
            .await
            .map_err(|e| ContainerError::Runtime(e.to_string()))
    }
}
