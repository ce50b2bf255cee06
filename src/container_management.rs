//! Container management subsystem.
//!
//! This module launches one short-lived container per call, waits for it to
//! finish and reports its exit status. Two interchangeable strategies satisfy
//! the same [`ContainerRuntime`] contract:
//! - [`ApiRuntime`]: drives the engine through its programmatic API
//!   (create, start, wait, logs on failure, remove).
//! - [`CliRuntime`]: shells out to `docker run --rm ...`.
//!
//! Re-exports:
//! - [`ContainerRuntime`], [`ContainerApi`]: the capability and the engine boundary.
//! - [`ContainerSpec`], [`ContainerHandle`], [`CompletionResult`], [`Diagnostics`],
//!   [`RuntimeKind`]: core types.
//!
//! Example (non-running):
//! ```ignore
//! use kernimg::configuration::config::Config;
//! use kernimg::container_management::{runtime_from_config, ContainerSpec};
//!
//! let runtime = runtime_from_config(&Config::default())?;
//! let spec = ContainerSpec::new("alpine").arg("true");
//! let completion = runtime.run(spec).await?;
//! assert!(completion.succeeded());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod api_runtime;
pub mod cli_runtime;
pub mod diagnostics;
pub mod docker_api;
pub mod runtime;
#[cfg(test)]
pub mod tests;
pub mod types;

pub use api_runtime::ApiRuntime;
pub use cli_runtime::CliRuntime;
pub use docker_api::DockerApi;
pub use runtime::{runtime_from_config, ContainerApi, ContainerRuntime, LogOptions, LogStream};
pub use types::{CompletionResult, ContainerHandle, ContainerSpec, Diagnostics, RuntimeKind};
