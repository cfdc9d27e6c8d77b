//! Step-indexed schedules (learning-rate decay)

use serde::{Deserialize, Serialize};

/// Trait for schedules indexed by a global step
pub trait Schedule: Send + Sync {
    /// Get value at step t
    fn value(&self, t: u64) -> f64;
}

/// Staircase exponential decay: `initial * rate^floor(t / decay_steps)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaircaseDecay {
    /// Value at step 0
    pub initial: f64,
    /// Steps between two decays
    pub decay_steps: u64,
    /// Multiplicative factor applied at every stair
    pub rate: f64,
}

impl StaircaseDecay {
    /// Halve `initial` every `decay_steps` steps
    #[must_use]
    pub fn halving(initial: f64, decay_steps: u64) -> Self {
        Self {
            initial,
            decay_steps,
            rate: 0.5,
        }
    }
}

impl Schedule for StaircaseDecay {
    fn value(&self, t: u64) -> f64 {
        let stairs = t / self.decay_steps.max(1);
        self.initial * self.rate.powf(stairs as f64)
    }
}
