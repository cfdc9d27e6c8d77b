//! Tabular control agents
//!
//! This crate provides:
//! - Monte-Carlo control with an optional offline lambda-return
//! - TD(0) control (Sarsa, Q-learning, Expected Sarsa, Q(sigma))
//! - n-step Sarsa and Sarsa(lambda) with eligibility traces
//! - Typed configurations, episode metrics and random hyperparameter search

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod agent;
pub mod config;
pub mod mc;
pub mod metrics;
pub mod search;
pub mod td0;
pub mod td_lambda;
pub mod tdn;

// Re-export agents
pub use agent::{build_agent, play, train, AgentCore, Checkpoint, Exploration, TabularAgent};
pub use mc::MonteCarloAgent;
pub use td0::Td0Agent;
pub use td_lambda::TdLambdaAgent;
pub use tdn::TdNAgent;

// Re-export configuration
pub use config::{AgentConfig, AgentKind, MonteCarloConfig, Td0Config, TdLambdaConfig, TdNConfig};

// Re-export metrics and search
pub use metrics::{EpisodeMode, EpisodeReport, MemorySink, MetricsSink, Tee, TracingSink};
pub use search::{RandomSearch, SearchSettings, TrialResult};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        build_agent, play, train, AgentConfig, AgentKind, EpisodeReport, MemorySink,
        MetricsSink, TabularAgent, TracingSink,
    };
    pub use tdlab_core::prelude::*;
}
