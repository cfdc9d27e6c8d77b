//! Action-value estimates

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::check_index;
use crate::Result;

/// Anything that can produce a row of per-action value estimates for a state.
///
/// Exploration and target code consume rows through this trait so that a
/// table lookup and a learned estimator's forward pass are interchangeable.
pub trait ActionValues {
    /// Number of actions per row
    fn nb_actions(&self) -> usize;

    /// Value estimates of every action in `state`
    fn action_values(&self, state: usize) -> Result<ArrayView1<'_, f64>>;
}

/// Index of the largest value, ties broken by the lowest index.
///
/// NaN entries never win. Returns 0 on an empty row.
#[must_use]
pub fn argmax(values: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

/// Tabular action-value function `Q[state, action]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    values: Array2<f64>,
}

impl QTable {
    /// Create a table with every entry set to `initial_q_value`
    #[must_use]
    pub fn new(nb_states: usize, nb_actions: usize, initial_q_value: f64) -> Self {
        Self {
            values: Array2::from_elem((nb_states, nb_actions), initial_q_value),
        }
    }

    /// Wrap an existing array
    #[must_use]
    pub fn from_array(values: Array2<f64>) -> Self {
        Self { values }
    }

    /// Number of states (rows)
    #[must_use]
    pub fn nb_states(&self) -> usize {
        self.values.nrows()
    }

    /// Check that a state-action pair lies inside the table
    pub fn check(&self, state: usize, action: usize) -> Result<()> {
        check_index("state", state, self.values.nrows())?;
        check_index("action", action, self.values.ncols())
    }

    /// `Q[state, action]`
    pub fn get(&self, state: usize, action: usize) -> Result<f64> {
        self.check(state, action)?;
        Ok(self.values[(state, action)])
    }

    /// `Q[state, action] += delta`
    pub fn add(&mut self, state: usize, action: usize, delta: f64) -> Result<()> {
        self.check(state, action)?;
        self.values[(state, action)] += delta;
        Ok(())
    }

    /// Greedy action in `state` (lowest index on ties)
    pub fn greedy_action(&self, state: usize) -> Result<usize> {
        Ok(argmax(self.action_values(state)?))
    }

    /// `max_a Q[state, a]`
    pub fn greedy_value(&self, state: usize) -> Result<f64> {
        let row = self.action_values(state)?;
        Ok(row.get(argmax(row)).copied().unwrap_or(0.0))
    }

    /// Read-only view of the whole table
    #[must_use]
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Mutable access to the whole table (shape cannot change through it)
    pub fn values_mut(&mut self) -> ndarray::ArrayViewMut2<'_, f64> {
        self.values.view_mut()
    }
}

impl ActionValues for QTable {
    fn nb_actions(&self) -> usize {
        self.values.ncols()
    }

    fn action_values(&self, state: usize) -> Result<ArrayView1<'_, f64>> {
        check_index("state", state, self.values.nrows())?;
        Ok(self.values.row(state))
    }
}

impl ActionValues for ArrayView2<'_, f64> {
    fn nb_actions(&self) -> usize {
        self.ncols()
    }

    fn action_values(&self, state: usize) -> Result<ArrayView1<'_, f64>> {
        check_index("state", state, self.nrows())?;
        Ok(self.row(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_argmax_prefers_lowest_index() {
        assert_eq!(argmax(array![0.0, 0.0].view()), 0);
        assert_eq!(argmax(array![1.0, 3.0, 3.0].view()), 1);
        assert_eq!(argmax(array![f64::NAN, -1.0].view()), 1);
    }

    #[test]
    fn test_table_bounds() {
        let mut q = QTable::new(3, 2, 0.5);
        assert_eq!(q.get(2, 1).unwrap(), 0.5);
        assert!(q.get(3, 0).is_err());
        assert!(q.add(0, 2, 1.0).is_err());

        q.add(1, 1, 1.0).unwrap();
        assert_eq!(q.greedy_action(1).unwrap(), 1);
        assert_eq!(q.greedy_value(1).unwrap(), 1.5);
        assert_eq!(q.action_values(1).unwrap().to_vec(), vec![0.5, 1.5]);
    }
}
