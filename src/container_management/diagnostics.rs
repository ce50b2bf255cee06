//! Recovers the output of a container that exited with a non-zero status.

use futures::StreamExt;
use log::{error, warn};

use crate::container_management::runtime::{ContainerApi, LogOptions};
use crate::container_management::types::{ContainerHandle, Diagnostics};

/// Reads the full combined stdout/stderr history of `handle` to its end.
///
/// Must run before the instance is removed. A failure to fetch the logs is
/// only a warning and never replaces the exit status as the cause of a failed
/// run: output read before the failure is kept, and
/// [`Diagnostics::Unavailable`] is returned only when nothing was read.
pub async fn collect<A>(api: &A, handle: &ContainerHandle) -> Diagnostics
where
    A: ContainerApi + ?Sized,
{
    let mut frames = api.logs(handle, LogOptions::full_history());
    let mut output = Vec::new();

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(bytes) => output.extend_from_slice(&bytes),
            Err(e) => {
                warn!("Failed to get logs for container {}: {}", handle, e);
                if output.is_empty() {
                    return Diagnostics::Unavailable(e.to_string());
                }
                break;
            }
        }
    }

    if !output.is_empty() {
        error!(
            "Output of container {}:\n{}",
            handle,
            String::from_utf8_lossy(&output).trim_end()
        );
    }
    Diagnostics::Collected(output)
}
