//! Build orchestration.
//!
//! Sequences the staging area and a container runtime to realize a recipe.
//! For the boot-creator recipe one build moves through
//! `Staged -> Running -> {Succeeded | FailedNonZero | FailedLaunch} -> Cleaned`,
//! and the staging area is torn down on every path.
//!
//! Components:
//! - `orchestrator`: [`BuildOrchestrator`], the composition root.
//! - `recipe`: argument and bind-mount layouts of the supported builder images.
//! - `types`: requests, results and build states.

pub mod orchestrator;
pub mod recipe;
pub mod types;

pub use orchestrator::BuildOrchestrator;
pub use recipe::{BootCreatorRecipe, CompilerRecipe};
pub use types::{BuildRequest, BuildResult, BuildState};
