//! Error types shared across the staging, container and orchestration subsystems.

pub mod types;
