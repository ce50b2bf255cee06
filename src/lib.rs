pub mod build_orchestration;
pub use build_orchestration::{BuildOrchestrator, BuildRequest, BuildResult};

pub mod configuration;

pub mod container_management;

pub mod error_handling;

pub mod staging;
