//! Core tabular reinforcement-learning building blocks for tdlab
//!
//! Visitation counters, exploration policies, return and bootstrap target
//! estimators, eligibility traces and tabular learning rules, plus the
//! environment and discretizer traits the agents are written against.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod action;
pub mod counter;
pub mod discretizer;
pub mod environment;
pub mod error;
pub mod exploration;
pub mod learner;
pub mod observation;
pub mod returns;
pub mod reward;
pub mod schedule;
pub mod target;
pub mod trace;
pub mod trajectory;
pub mod value;

// Re-export core traits and types
pub use action::DiscreteSpace;
pub use counter::{Counter, StateActionCounter, StateCounter};
pub use discretizer::{Discretizer, GridDiscretizer, IndexDiscretizer};
pub use environment::{Environment, Step, StepInfo};
pub use error::{RLError, Result};
pub use exploration::{BatchSelection, EpsilonGreedy, ExplorationPolicy, Greedy, Selection, Ucb1};
pub use learner::{DutchTraceLearner, EligibilityLearner, LearningRate, TabularLearner};
pub use observation::{Observation, VectorObservation};
pub use reward::Reward;
pub use schedule::{Schedule, StaircaseDecay};
pub use target::{compute_targets, TargetKind, Transition};
pub use trace::{EligibilityTraces, TraceKind};
pub use trajectory::{History, Record};
pub use value::{argmax, ActionValues, QTable};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ActionValues, Discretizer, Environment, ExplorationPolicy, Observation, QTable, Result,
        Reward, Step, TabularLearner,
    };
}
