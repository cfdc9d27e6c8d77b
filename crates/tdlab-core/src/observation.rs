//! Observations emitted by environments

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for observations from an environment
pub trait Observation: Clone + Debug + Send + Sync {
    /// Feature vector read by discretizers
    fn features(&self) -> &[f64];
}

/// Vector observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorObservation {
    /// The observation data
    pub data: Vec<f64>,
}

impl VectorObservation {
    /// Wrap raw features
    #[must_use]
    pub fn new(data: Vec<f64>) -> Self {
        Self { data }
    }

    /// Single-feature observation holding a discrete index
    #[must_use]
    pub fn index(index: usize) -> Self {
        Self {
            data: vec![index as f64],
        }
    }
}

impl From<Vec<f64>> for VectorObservation {
    fn from(data: Vec<f64>) -> Self {
        Self { data }
    }
}

impl Observation for VectorObservation {
    fn features(&self) -> &[f64] {
        &self.data
    }
}
