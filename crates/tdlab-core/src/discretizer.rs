//! Mapping observations to tabular state indices

use serde::{Deserialize, Serialize};

use crate::error::{check_index, check_len, RLError};
use crate::Result;

/// Maps an observation's features to a state index in `[0, nb_states)`
pub trait Discretizer: Send + Sync {
    /// Total number of discrete states
    fn nb_states(&self) -> usize;

    /// Convert features to a state index
    fn state_index(&self, features: &[f64]) -> Result<usize>;
}

/// Passes through observations that already hold a single state index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDiscretizer {
    nb_states: usize,
}

impl IndexDiscretizer {
    /// Accept indices below `nb_states`
    #[must_use]
    pub fn new(nb_states: usize) -> Self {
        Self { nb_states }
    }
}

impl Discretizer for IndexDiscretizer {
    fn nb_states(&self) -> usize {
        self.nb_states
    }

    fn state_index(&self, features: &[f64]) -> Result<usize> {
        check_len(1, features.len())?;
        let value = features[0];
        if !(value >= 0.0 && value.fract() == 0.0) {
            return Err(RLError::Environment(format!(
                "observation {value} is not a state index"
            )));
        }
        let index = value as usize;
        check_index("state", index, self.nb_states)?;
        Ok(index)
    }
}

/// Uniform grid over a box, clamping values outside `[low, high]`.
///
/// The first dimension varies fastest in the flat index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDiscretizer {
    bins: Vec<usize>,
    low: Vec<f64>,
    high: Vec<f64>,
}

impl GridDiscretizer {
    /// Create a grid with `bins[d]` cells on dimension `d`
    pub fn new(bins: Vec<usize>, low: Vec<f64>, high: Vec<f64>) -> Result<Self> {
        check_len(bins.len(), low.len())?;
        check_len(bins.len(), high.len())?;
        if bins.iter().any(|&b| b == 0) {
            return Err(RLError::config("every dimension needs at least one bin"));
        }
        if low.iter().zip(&high).any(|(l, h)| !(l < h)) {
            return Err(RLError::config("grid bounds must satisfy low < high"));
        }
        Ok(Self { bins, low, high })
    }

    /// Same bin count on every dimension
    pub fn uniform(bins: usize, low: Vec<f64>, high: Vec<f64>) -> Result<Self> {
        Self::new(vec![bins; low.len()], low, high)
    }

    fn bin(&self, dim: usize, value: f64) -> usize {
        let (low, high, bins) = (self.low[dim], self.high[dim], self.bins[dim]);
        let normalized = (value.clamp(low, high) - low) / (high - low);
        // value == high lands in the last cell
        ((normalized * bins as f64).floor() as usize).min(bins - 1)
    }
}

impl Discretizer for GridDiscretizer {
    fn nb_states(&self) -> usize {
        self.bins.iter().product()
    }

    fn state_index(&self, features: &[f64]) -> Result<usize> {
        check_len(self.bins.len(), features.len())?;
        if let Some(bad) = features.iter().find(|v| v.is_nan()) {
            return Err(RLError::Environment(format!("cannot discretize {bad}")));
        }

        let mut index = 0;
        let mut stride = 1;
        for (dim, &value) in features.iter().enumerate() {
            index += self.bin(dim, value) * stride;
            stride *= self.bins[dim];
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_passthrough() {
        let d = IndexDiscretizer::new(4);
        assert_eq!(d.state_index(&[3.0]).unwrap(), 3);
        assert!(matches!(
            d.state_index(&[4.0]),
            Err(RLError::IndexOutOfBounds { .. })
        ));
        assert!(d.state_index(&[1.5]).is_err());
        assert!(d.state_index(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_grid_corners_and_clamping() {
        let d = GridDiscretizer::uniform(10, vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        assert_eq!(d.nb_states(), 100);
        assert_eq!(d.state_index(&[0.0, 0.0]).unwrap(), 0);
        assert_eq!(d.state_index(&[1.0, 1.0]).unwrap(), 99);
        assert_eq!(d.state_index(&[0.15, 0.0]).unwrap(), 1);
        assert_eq!(d.state_index(&[0.0, 0.15]).unwrap(), 10);
        assert_eq!(d.state_index(&[-5.0, 7.0]).unwrap(), 90);
    }

    #[test]
    fn test_grid_rejects_bad_shapes() {
        assert!(GridDiscretizer::new(vec![2], vec![0.0, 0.0], vec![1.0]).is_err());
        assert!(GridDiscretizer::new(vec![0], vec![0.0], vec![1.0]).is_err());
        assert!(GridDiscretizer::new(vec![2], vec![1.0], vec![1.0]).is_err());

        let d = GridDiscretizer::uniform(3, vec![0.0], vec![1.0]).unwrap();
        assert!(d.state_index(&[f64::NAN]).is_err());
    }
}
