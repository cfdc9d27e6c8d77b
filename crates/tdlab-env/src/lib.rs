//! Simulated environments for tabular temporal-difference agents
//!
//! This crate provides:
//! - Discrete toy problems whose observations are state indices
//! - Classic control problems paired with grid discretizers
//! - A time limit wrapper and a name-based registry

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod classic;
pub mod registry;
pub mod toy;
pub mod wrappers;

// Re-export environments
pub use classic::{CartPoleEnv, MountainCarEnv};
pub use registry::{make_env, BoxedEnv, EnvConfig, EnvHandle, EnvRegistry};
pub use toy::{CliffWalking, RandomWalk};
pub use wrappers::TimeLimit;

// Re-export core types
pub use tdlab_core::{Discretizer, Environment, Step, StepInfo, VectorObservation};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        make_env, CartPoleEnv, CliffWalking, EnvConfig, EnvRegistry, MountainCarEnv, RandomWalk,
        TimeLimit,
    };
    pub use tdlab_core::prelude::*;
}
