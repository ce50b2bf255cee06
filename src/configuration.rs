//! Configuration subsystem.
//!
//! Settings come from an optional TOML file; command-line flags and their
//! environment fallbacks override it.
//!
//! Re-exports: [`Config`], [`CliArgs`]

pub mod config;
pub mod types;

pub use config::{CliArgs, Config};
