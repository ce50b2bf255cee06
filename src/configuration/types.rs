//! Defaults shared by the configuration layer and the recipes.

use std::path::PathBuf;

pub const DEFAULT_DOCKER_BINARY: &str = "docker";
pub const DEFAULT_BOOT_CREATOR_IMAGE: &str = "projectunik/boot-creator";
pub const DEFAULT_DEVICE_DIR: &str = "/dev/";

/// Environment variable names accepted for the builder container.
pub const ENV_KEY_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// `<system temp>/kernimg`, the base for staging areas and result files.
pub fn default_tmp_dir() -> PathBuf {
    std::env::temp_dir().join("kernimg")
}
