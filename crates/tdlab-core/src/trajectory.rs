//! Per-episode experience history

use serde::{Deserialize, Serialize};

use crate::returns::monte_carlo_returns;

/// One step of an episode as kept for delayed updates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// State the action was taken in
    pub state: usize,
    /// Action taken
    pub action: usize,
    /// Reward received
    pub reward: f64,
    /// Bootstrap estimate observed right after the step (0 when terminal)
    pub estimate: f64,
}

/// Append-only record of a single episode
#[derive(Debug, Clone, Default)]
pub struct History {
    records: Vec<Record>,
    total_reward: f64,
}

impl History {
    /// Create an empty history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn push(&mut self, record: Record) {
        self.total_reward += record.reward;
        self.records.push(record);
    }

    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no step was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Undiscounted sum of rewards
    #[must_use]
    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    /// All records in order
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// The last `n` records (all of them when fewer exist)
    #[must_use]
    pub fn tail(&self, n: usize) -> &[Record] {
        &self.records[self.records.len().saturating_sub(n)..]
    }

    /// Visited states
    #[must_use]
    pub fn states(&self) -> Vec<usize> {
        self.records.iter().map(|r| r.state).collect()
    }

    /// Taken actions
    #[must_use]
    pub fn actions(&self) -> Vec<usize> {
        self.records.iter().map(|r| r.action).collect()
    }

    /// Rewards, in order
    #[must_use]
    pub fn rewards(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.reward).collect()
    }

    /// Bootstrap estimates, in order
    #[must_use]
    pub fn estimates(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.estimate).collect()
    }

    /// Discounted reward-to-go for every step
    #[must_use]
    pub fn returns(&self, discount: f64) -> Vec<f64> {
        monte_carlo_returns(&self.rewards(), discount).to_vec()
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.records.clear();
        self.total_reward = 0.0;
    }
}
