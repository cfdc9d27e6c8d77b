//! Visitation counters keyed by state or state-action indices
//!
//! Counts are stored as `f64` so they can feed straight into the
//! exploration and learning-rate formulas. A counter only ever grows:
//! every occurrence of an index in a batch adds exactly one.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::check_index;
use crate::Result;

/// Common contract of the counter stores
pub trait Counter {
    /// Index type (`usize` for states, `(usize, usize)` for pairs)
    type Index: Copy;

    /// Fail if `index` is outside the store
    fn check(&self, index: Self::Index) -> Result<()>;

    /// Current count at `index`
    fn get(&self, index: Self::Index) -> Result<f64>;

    /// Add one at `index`
    fn increment(&mut self, index: Self::Index) -> Result<()>;

    /// Current counts for every index of a batch
    fn get_batch(&self, indices: &[Self::Index]) -> Result<Vec<f64>> {
        indices.iter().map(|&i| self.get(i)).collect()
    }

    /// Add one per occurrence. Nothing is mutated unless every index is valid.
    fn increment_batch(&mut self, indices: &[Self::Index]) -> Result<()> {
        for &index in indices {
            self.check(index)?;
        }
        for &index in indices {
            self.increment(index)?;
        }
        Ok(())
    }
}

/// Per-state counter `N[state]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCounter {
    counts: Array1<f64>,
}

impl StateCounter {
    /// Create a counter over `nb_states` states, every entry set to `initial`
    #[must_use]
    pub fn new(nb_states: usize, initial: f64) -> Self {
        Self {
            counts: Array1::from_elem(nb_states, initial),
        }
    }

    /// Number of states tracked
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether the store tracks no state at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Read-only view over all counts
    #[must_use]
    pub fn counts(&self) -> &Array1<f64> {
        &self.counts
    }
}

impl Counter for StateCounter {
    type Index = usize;

    fn check(&self, state: usize) -> Result<()> {
        check_index("state", state, self.counts.len())
    }

    fn get(&self, state: usize) -> Result<f64> {
        self.check(state)?;
        Ok(self.counts[state])
    }

    fn increment(&mut self, state: usize) -> Result<()> {
        self.check(state)?;
        self.counts[state] += 1.0;
        Ok(())
    }
}

/// Per-state-action counter `Nsa[state, action]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateActionCounter {
    counts: Array2<f64>,
}

impl StateActionCounter {
    /// Create a counter over `nb_states x nb_actions` pairs, every entry set to `initial`
    #[must_use]
    pub fn new(nb_states: usize, nb_actions: usize, initial: f64) -> Self {
        Self {
            counts: Array2::from_elem((nb_states, nb_actions), initial),
        }
    }

    /// `(nb_states, nb_actions)`
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.counts.dim()
    }

    /// Read-only view over all counts
    #[must_use]
    pub fn counts(&self) -> &Array2<f64> {
        &self.counts
    }
}

impl Counter for StateActionCounter {
    type Index = (usize, usize);

    fn check(&self, (state, action): (usize, usize)) -> Result<()> {
        let (nb_states, nb_actions) = self.counts.dim();
        check_index("state", state, nb_states)?;
        check_index("action", action, nb_actions)
    }

    fn get(&self, pair: (usize, usize)) -> Result<f64> {
        self.check(pair)?;
        Ok(self.counts[pair])
    }

    fn increment(&mut self, pair: (usize, usize)) -> Result<()> {
        self.check(pair)?;
        self.counts[pair] += 1.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RLError;

    #[test]
    fn test_batch_repeats_accumulate() {
        let mut counter = StateCounter::new(4, 0.0);
        counter.increment_batch(&[1, 1, 3, 1]).unwrap();

        assert_eq!(counter.get(1).unwrap(), 3.0);
        assert_eq!(counter.get(3).unwrap(), 1.0);
        assert_eq!(counter.get_batch(&[0, 1]).unwrap(), vec![0.0, 3.0]);
    }

    #[test]
    fn test_out_of_range_leaves_counts_untouched() {
        let mut counter = StateActionCounter::new(2, 2, 1.0);
        let err = counter.increment_batch(&[(0, 0), (0, 2)]).unwrap_err();

        assert!(matches!(
            err,
            RLError::IndexOutOfBounds { kind: "action", index: 2, bound: 2 }
        ));
        assert_eq!(counter.get((0, 0)).unwrap(), 1.0);
    }

    #[test]
    fn test_get_has_no_side_effect() {
        let mut counter = StateCounter::new(1, 0.0);
        counter.increment(0).unwrap();
        let _ = counter.get(0).unwrap();
        let _ = counter.get(0).unwrap();
        assert_eq!(counter.get(0).unwrap(), 1.0);
    }
}
