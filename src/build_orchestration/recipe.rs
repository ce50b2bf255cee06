//! Argument and bind-mount layouts of the builder images.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::configuration::config::Config;
use crate::configuration::types::{DEFAULT_BOOT_CREATOR_IMAGE, DEFAULT_DEVICE_DIR};
use crate::container_management::ContainerSpec;
use crate::staging::KERNEL_FILE_NAME;

/// Where the staging area is mounted inside the boot-creator container.
pub const CONTAINER_CONTEXT_DIR: &str = "/opt/vol/";
/// File the boot-creator image leaves in its context directory on success.
pub const VOLUME_IMAGE_NAME: &str = "vol.img";
/// Where a compiler image expects its sources.
pub const COMPILER_SOURCE_DIR: &str = "/opt/code";

/// `<image> -d <context> -p <kernel> -a <cmdline>`, privileged, with the
/// staging area and the host device directory bound in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootCreatorRecipe {
    pub image: String,
    pub device_dir: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl Default for BootCreatorRecipe {
    fn default() -> Self {
        Self {
            image: DEFAULT_BOOT_CREATOR_IMAGE.to_string(),
            device_dir: PathBuf::from(DEFAULT_DEVICE_DIR),
            env: BTreeMap::new(),
        }
    }
}

impl BootCreatorRecipe {
    pub fn from_config(config: &Config) -> Self {
        Self {
            image: config.boot_creator_image.clone(),
            device_dir: config.device_dir.clone(),
            env: config.env.clone(),
        }
    }

    pub fn container_spec(&self, staging_dir: &Path, cmdline: &str) -> ContainerSpec {
        let device_dir = self.device_dir.to_string_lossy().to_string();
        ContainerSpec::new(&self.image)
            .args([
                "-d",
                CONTAINER_CONTEXT_DIR,
                "-p",
                KERNEL_FILE_NAME,
                "-a",
                cmdline,
            ])
            .bind(staging_dir, CONTAINER_CONTEXT_DIR)
            .bind(&self.device_dir, device_dir)
            // Raw device access is needed to assemble the disk image.
            .privileged(true)
            .envs(&self.env)
    }
}

/// A compiler image run unprivileged against a source directory mounted at
/// [`COMPILER_SOURCE_DIR`], driven only by its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerRecipe {
    pub image: String,
}

impl CompilerRecipe {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }

    pub fn container_spec(
        &self,
        source_dir: &Path,
        env: &BTreeMap<String, String>,
    ) -> ContainerSpec {
        ContainerSpec::new(&self.image)
            .bind(source_dir, COMPILER_SOURCE_DIR)
            .envs(env)
    }
}
