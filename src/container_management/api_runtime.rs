use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::container_management::diagnostics;
use crate::container_management::runtime::{ContainerApi, ContainerRuntime};
use crate::container_management::types::{
    CompletionResult, ContainerHandle, ContainerSpec, RuntimeKind,
};
use crate::error_handling::types::ContainerError;

/// Runs containers through the engine's programmatic API.
///
/// Lifecycle of one call: create, start, wait, collect logs if the exit status
/// is non-zero, remove. Removal happens exactly once per successful create,
/// whether the later steps succeeded, failed, panicked or were cancelled by
/// dropping the call, and its own failure is only logged.
pub struct ApiRuntime<A> {
    api: Arc<A>,
    wait_timeout: Option<Duration>,
}

/// Owns a created instance until it is released.
///
/// Dropped without [`InstanceGuard::release`] (cancelled future, panic), it
/// hands the removal to the tokio runtime instead.
struct InstanceGuard<A: ContainerApi + 'static> {
    api: Arc<A>,
    handle: Option<ContainerHandle>,
}

impl<A: ContainerApi + 'static> InstanceGuard<A> {
    fn new(api: Arc<A>, handle: ContainerHandle) -> Self {
        Self {
            api,
            handle: Some(handle),
        }
    }

    /// Always `Some` while the guard is alive; only `release` and `drop` take it.
    fn handle(&self) -> Option<&ContainerHandle> {
        self.handle.as_ref()
    }

    async fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            remove(&*self.api, handle).await;
        }
    }
}

impl<A: ContainerApi + 'static> Drop for InstanceGuard<A> {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        warn!(
            "Container {} abandoned before release, removing it in the background",
            handle
        );
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let api = Arc::clone(&self.api);
                runtime.spawn(async move { remove(&*api, handle).await });
            }
            Err(_) => error!(
                "No async runtime left to remove container {}, it must be removed by hand",
                handle.id()
            ),
        }
    }
}

async fn remove<A: ContainerApi + ?Sized>(api: &A, handle: ContainerHandle) {
    let id = handle.short_id().to_string();
    match api.remove(handle).await {
        Ok(()) => debug!("Removed container {}", id),
        Err(e) => warn!("Failed to remove container {}: {}", id, e),
    }
}

impl<A: ContainerApi + 'static> ApiRuntime<A> {
    pub fn new(api: A) -> Self {
        Self {
            api: Arc::new(api),
            wait_timeout: None,
        }
    }

    /// Bounds the wait for completion. When it elapses the run fails with a
    /// runtime error and the instance is still removed.
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Everything between create and remove.
    async fn drive(&self, handle: &ContainerHandle) -> Result<CompletionResult, ContainerError> {
        self.api.start(handle).await.map_err(|e| {
            error!("Failed to start container {}: {}", handle, e);
            e.into_runtime()
        })?;
        debug!("Started container {}", handle);

        let exit_code = self.wait_for_exit(handle).await.map_err(|e| {
            error!("Failed waiting for container {}: {}", handle, e);
            e.into_runtime()
        })?;

        if exit_code == 0 {
            info!("Container {} exited successfully", handle);
            return Ok(CompletionResult::success());
        }

        error!("Container {} exit status non zero: {}", handle, exit_code);
        let diagnostics = diagnostics::collect(&*self.api, handle).await;
        Ok(CompletionResult::failed(exit_code, diagnostics))
    }

    async fn wait_for_exit(&self, handle: &ContainerHandle) -> Result<i64, ContainerError> {
        match self.wait_timeout {
            Some(limit) => tokio::time::timeout(limit, self.api.wait(handle))
                .await
                .map_err(|_| {
                    ContainerError::Runtime(format!(
                        "container {} did not finish within {}s",
                        handle,
                        limit.as_secs()
                    ))
                })?,
            None => self.api.wait(handle).await,
        }
    }
}

#[async_trait]
impl<A: ContainerApi + 'static> ContainerRuntime for ApiRuntime<A> {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Api
    }

    async fn run(&self, spec: ContainerSpec) -> Result<CompletionResult, ContainerError> {
        let handle = self.api.create(&spec).await.map_err(|e| {
            error!("Error creating container from image {}: {}", spec.image, e);
            e.into_launch()
        })?;

        info!(
            "Created container {} from image {} (cmd: {:?}, binds: {:?}, privileged: {})",
            handle,
            spec.image,
            spec.args,
            spec.bind_strings(),
            spec.privileged
        );

        let guard = InstanceGuard::new(Arc::clone(&self.api), handle);
        let outcome = match guard.handle() {
            Some(handle) => self.drive(handle).await,
            None => Err(ContainerError::Runtime("container handle already released".into())),
        };
        guard.release().await;
        outcome
    }
}
