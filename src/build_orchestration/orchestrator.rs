use chrono::Utc;
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::build_orchestration::recipe::{BootCreatorRecipe, CompilerRecipe, VOLUME_IMAGE_NAME};
use crate::build_orchestration::types::{BuildRequest, BuildResult, BuildState};
use crate::configuration::config::Config;
use crate::container_management::{CompletionResult, ContainerRuntime};
use crate::error_handling::types::{BuildError, ContainerError};
use crate::staging::StagingArea;

/// Turns kernels into bootable images by running the boot-creator recipe in
/// a disposable container.
///
/// Holds no per-build state: each call owns its own staging area and
/// container, so one orchestrator can serve concurrent builds.
pub struct BuildOrchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    recipe: BootCreatorRecipe,
    tmp_dir: PathBuf,
}

impl BuildOrchestrator {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        recipe: BootCreatorRecipe,
        tmp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runtime,
            recipe,
            tmp_dir: tmp_dir.into(),
        }
    }

    pub fn from_config(runtime: Arc<dyn ContainerRuntime>, config: &Config) -> Self {
        Self::new(
            runtime,
            BootCreatorRecipe::from_config(config),
            config.tmp_dir.clone(),
        )
    }

    /// Builds a bootable image from `request.kernel_path`.
    ///
    /// On success the image is a fresh file under the configured temporary
    /// directory, owned by the caller. On failure nothing is left behind: the
    /// staging area is removed on every path, after the image (if any) was
    /// moved out of it.
    pub async fn build_bootable_image(
        &self,
        request: &BuildRequest,
    ) -> Result<BuildResult, BuildError> {
        let build_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            "[{}] Building bootable image from {} (cmdline: {:?})",
            build_id,
            request.kernel_path.display(),
            request.cmdline
        );

        let staging = StagingArea::prepare(&self.tmp_dir, &request.kernel_path).map_err(|e| {
            error!("[{}] Unable to stage kernel: {}", build_id, e);
            e
        })?;
        transition(build_id, BuildState::Staged);

        let outcome = self.run_boot_creator(build_id, &staging, request).await;

        if let Err(e) = staging.teardown() {
            warn!("[{}] {}", build_id, e);
        }
        transition(build_id, BuildState::Cleaned);

        let image_path = outcome?;
        let finished_at = Utc::now();
        info!(
            "[{}] Bootable image ready at {} ({} ms)",
            build_id,
            image_path.display(),
            (finished_at - started_at).num_milliseconds()
        );
        Ok(BuildResult {
            build_id,
            image_path,
            started_at,
            finished_at,
        })
    }

    /// `Staged -> Running -> {Succeeded | FailedNonZero | FailedLaunch}`.
    async fn run_boot_creator(
        &self,
        build_id: Uuid,
        staging: &StagingArea,
        request: &BuildRequest,
    ) -> Result<PathBuf, BuildError> {
        let spec = self.recipe.container_spec(staging.path(), &request.cmdline);
        transition(build_id, BuildState::Running);

        let completion = self.runtime.run(spec).await.map_err(|e| {
            transition(build_id, BuildState::FailedLaunch);
            error!("[{}] Builder container did not complete: {}", build_id, e);
            e
        })?;

        check_completion(completion).map_err(|e| {
            transition(build_id, BuildState::FailedNonZero);
            error!("[{}] Builder container failed", build_id);
            e
        })?;

        let image_path = self.extract_image(staging).map_err(|e| {
            transition(build_id, BuildState::FailedLaunch);
            error!("[{}] {}", build_id, e);
            e
        })?;
        transition(build_id, BuildState::Succeeded);
        Ok(image_path)
    }

    /// Moves the produced volume image out of the staging area into a new
    /// caller-owned file under the temporary directory.
    fn extract_image(&self, staging: &StagingArea) -> Result<PathBuf, BuildError> {
        let produced = staging.path().join(VOLUME_IMAGE_NAME);

        let (_file, result_path) = tempfile::NamedTempFile::new_in(&self.tmp_dir)
            .and_then(|file| file.keep().map_err(|e| e.error))
            .map_err(|e| BuildError::Artifact {
                path: self.tmp_dir.clone(),
                source: e,
            })?;

        if let Err(e) = fs::rename(&produced, &result_path) {
            if let Err(cleanup) = fs::remove_file(&result_path) {
                warn!(
                    "Failed to remove placeholder {}: {}",
                    result_path.display(),
                    cleanup
                );
            }
            return Err(BuildError::Artifact {
                path: produced,
                source: e,
            });
        }

        debug!(
            "Moved {} to {}",
            produced.display(),
            result_path.display()
        );
        Ok(result_path)
    }

    /// Runs `recipe` against `source_dir`, unprivileged.
    ///
    /// Whatever the compiler writes lands in `source_dir` itself; no staging
    /// area is involved.
    pub async fn run_compiler(
        &self,
        recipe: &CompilerRecipe,
        source_dir: &Path,
        env: &BTreeMap<String, String>,
    ) -> Result<(), BuildError> {
        info!(
            "Compiling {} with image {}",
            source_dir.display(),
            recipe.image
        );
        let completion = self
            .runtime
            .run(recipe.container_spec(source_dir, env))
            .await?;
        check_completion(completion)?;
        Ok(())
    }
}

/// A non-zero exit becomes a runtime error carrying the collected output.
fn check_completion(completion: CompletionResult) -> Result<(), ContainerError> {
    if completion.succeeded() {
        return Ok(());
    }
    Err(ContainerError::NonZeroExit {
        exit_code: completion.exit_code,
        logs: completion.diagnostics_text(),
    })
}

fn transition(build_id: Uuid, state: BuildState) {
    debug!("[{}] -> {}", build_id, state);
}
