//! Staging subsystem.
//!
//! A staging area is the host-side working directory of one build: the kernel
//! is copied into it under a fixed name, it is bound into the builder container,
//! and it is removed when the build finishes, whatever the outcome.
//!
//! Re-exports:
//! - [`StagingArea`]: scoped owner of the directory.
//! - [`KERNEL_FILE_NAME`]: the fixed name the kernel is staged under.

pub mod staging_area;

pub use staging_area::{StagingArea, KERNEL_FILE_NAME};
