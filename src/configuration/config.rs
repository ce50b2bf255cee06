use clap::Parser;
use log::{debug, error, info};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::*;
use crate::container_management::RuntimeKind;
use crate::error_handling::types::ConfigError;

/// Runtime configuration of the image builder.
///
/// Loaded from a TOML file where every key is optional; missing keys take the
/// values of [`Config::default`]. Command-line flags are applied on top with
/// [`Config::apply_overrides`].
///
/// # Example
///
/// ```toml
/// runtime = "cli"
/// tmp_dir = "/var/tmp/kernimg"
/// wait_timeout_secs = 600
///
/// [env]
/// BOOT_DEBUG = "1"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Invocation strategy: the engine API client or the `docker` subprocess.
    pub runtime: RuntimeKind,
    /// Executable used by the subprocess strategy.
    pub docker_binary: String,
    /// Explicit engine endpoint for the API strategy. Local defaults when unset.
    pub docker_host: Option<String>,
    /// Base directory for staging areas and result files.
    pub tmp_dir: PathBuf,
    /// Image realizing the boot-creator recipe.
    pub boot_creator_image: String,
    /// Host device directory bound into the builder.
    pub device_dir: PathBuf,
    /// Upper bound on the wait for the builder to finish (API strategy only).
    pub wait_timeout_secs: Option<u64>,
    /// Extra environment passed to the builder.
    pub env: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime: RuntimeKind::default(),
            docker_binary: DEFAULT_DOCKER_BINARY.to_string(),
            docker_host: None,
            tmp_dir: default_tmp_dir(),
            boot_creator_image: DEFAULT_BOOT_CREATOR_IMAGE.to_string(),
            device_dir: PathBuf::from(DEFAULT_DEVICE_DIR),
            wait_timeout_secs: None,
            env: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Reads and validates a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Importing configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            error!("Unable to read configuration file {}: {}", path.display(), e);
            ConfigError::Io(e)
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Toml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// File configuration (or defaults) with the command-line flags applied.
    pub fn load(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => {
                debug!("No configuration file given, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(args);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, args: &CliArgs) {
        if let Some(runtime) = args.runtime {
            self.runtime = runtime;
        }
        if let Some(tmp_dir) = &args.tmp_dir {
            self.tmp_dir = tmp_dir.clone();
        }
        if let Some(image) = &args.image {
            self.boot_creator_image = image.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.boot_creator_image.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "boot_creator_image must not be empty".to_string(),
            ));
        }
        if self.docker_binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "docker_binary must not be empty".to_string(),
            ));
        }
        if self.wait_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "wait_timeout_secs must be greater than 0".to_string(),
            ));
        }

        let key_pattern =
            Regex::new(ENV_KEY_PATTERN).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        if let Some(key) = self.env.keys().find(|k| !key_pattern.is_match(k)) {
            return Err(ConfigError::InvalidEnvKey(key.clone()));
        }
        Ok(())
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_secs.map(Duration::from_secs)
    }
}

/// Command-line interface of the `kernimg` binary.
#[derive(Parser, Debug, Clone)]
#[command(name = "kernimg")]
#[command(version)]
#[command(about = "Turns a compiled kernel into a bootable disk image inside a disposable container")]
pub struct CliArgs {
    /// Kernel binary to package.
    pub kernel: PathBuf,

    /// Kernel command line baked into the image.
    #[arg(long, default_value = "")]
    pub cmdline: String,

    /// TOML configuration file.
    #[arg(long, env = "KERNIMG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Invocation strategy, `api` or `cli`.
    #[arg(long, env = "KERNIMG_RUNTIME")]
    pub runtime: Option<RuntimeKind>,

    /// Base directory for staging areas and result files.
    #[arg(long, env = "KERNIMG_TMP_DIR")]
    pub tmp_dir: Option<PathBuf>,

    /// Boot-creator image to use.
    #[arg(long)]
    pub image: Option<String>,

    /// Print the build result as JSON instead of a bare path.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,
}
