//! Discrete action spaces

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::check_index;
use crate::Result;

/// Discrete action space `{0, .., n - 1}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscreteSpace {
    /// Number of discrete actions
    pub n: usize,
}

impl DiscreteSpace {
    /// Create a new discrete action space
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self { n }
    }

    /// Uniformly sample an action
    pub fn sample(&self, rng: &mut dyn RngCore) -> usize {
        rng.gen_range(0..self.n.max(1))
    }

    /// Check if an action is valid within this space
    #[must_use]
    pub fn contains(&self, action: usize) -> bool {
        action < self.n
    }

    /// Fail with an index error for actions outside the space
    pub fn check(&self, action: usize) -> Result<()> {
        check_index("action", action, self.n)
    }
}
