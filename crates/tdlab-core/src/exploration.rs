//! Exploration policies for action selection
//!
//! Every policy turns a row of value estimates into an action and the
//! probability distribution that action was drawn from. Counters owned by a
//! policy are updated inside the selection call, after the values that drive
//! the decision have been read, so the count for step `t` is visible to the
//! decision at step `t + 1`.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, RngCore};

use crate::counter::{Counter, StateActionCounter, StateCounter};
use crate::error::{check_len, RLError};
use crate::value::argmax;
use crate::Result;

/// Outcome of a single selection
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Chosen action index
    pub action: usize,
    /// Probability of every action under the policy at selection time
    pub probs: Array1<f64>,
}

/// Outcome of a batched selection, one row per sample
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSelection {
    /// Chosen action per sample
    pub actions: Vec<usize>,
    /// `[nb_samples, nb_actions]` action probabilities
    pub probs: Array2<f64>,
}

/// Core exploration contract
pub trait ExplorationPolicy: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Number of actions the policy chooses from
    fn nb_actions(&self) -> usize;

    /// Select one action per state. `values` holds one row per state.
    fn select_batch(
        &mut self,
        states: &[usize],
        values: ArrayView2<'_, f64>,
        rng: &mut dyn RngCore,
    ) -> Result<BatchSelection>;

    /// Select an action for a single state
    fn select(
        &mut self,
        state: usize,
        values: ArrayView1<'_, f64>,
        rng: &mut dyn RngCore,
    ) -> Result<Selection> {
        let batch = self.select_batch(&[state], values.insert_axis(Axis(0)), rng)?;
        Ok(Selection {
            action: batch.actions[0],
            probs: batch.probs.row(0).to_owned(),
        })
    }

    /// Distribution the next selection in `state` would draw from.
    /// Counters are left untouched.
    fn probabilities(&self, state: usize, values: ArrayView1<'_, f64>) -> Result<Array1<f64>>;

    /// Selections recorded by the policy's counters so far
    fn counted_visits(&self) -> f64;
}

fn one_hot(nb_actions: usize, action: usize) -> Array1<f64> {
    let mut probs = Array1::zeros(nb_actions);
    probs[action] = 1.0;
    probs
}

fn check_values(states: &[usize], values: &ArrayView2<'_, f64>, nb_actions: usize) -> Result<()> {
    check_len(states.len(), values.nrows())?;
    check_len(nb_actions, values.ncols())
}

/// Epsilon-greedy with visitation-count decay:
/// `eps = max(N0 / (N0 + N[state]), min_eps)`.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    n0: f64,
    min_eps: f64,
    nb_actions: usize,
    visits: StateCounter,
}

impl EpsilonGreedy {
    /// Create a policy over `nb_states` states with visit counts starting at 0
    pub fn new(nb_states: usize, nb_actions: usize, n0: f64, min_eps: f64) -> Result<Self> {
        if nb_actions == 0 {
            return Err(RLError::config("epsilon-greedy needs at least one action"));
        }
        if !(n0.is_finite() && n0 >= 0.0) {
            return Err(RLError::config(format!("N0 must be finite and >= 0, got {n0}")));
        }
        if !(0.0..=1.0).contains(&min_eps) {
            return Err(RLError::config(format!("min_eps must lie in [0, 1], got {min_eps}")));
        }
        Ok(Self {
            n0,
            min_eps,
            nb_actions,
            visits: StateCounter::new(nb_states, 0.0),
        })
    }

    fn epsilon_from_count(&self, count: f64) -> f64 {
        if self.n0 == 0.0 {
            return self.min_eps;
        }
        (self.n0 / (self.n0 + count)).max(self.min_eps)
    }

    /// Exploration rate the next selection in `state` would use
    pub fn epsilon(&self, state: usize) -> Result<f64> {
        Ok(self.epsilon_from_count(self.visits.get(state)?))
    }

    /// Per-state visit counts
    #[must_use]
    pub fn visits(&self) -> &StateCounter {
        &self.visits
    }
}

impl ExplorationPolicy for EpsilonGreedy {
    fn name(&self) -> &'static str {
        "epsilon_greedy"
    }

    fn nb_actions(&self) -> usize {
        self.nb_actions
    }

    fn select_batch(
        &mut self,
        states: &[usize],
        values: ArrayView2<'_, f64>,
        rng: &mut dyn RngCore,
    ) -> Result<BatchSelection> {
        check_values(states, &values, self.nb_actions)?;
        // Every sample reads the count as it was before this batch.
        let counts = self.visits.get_batch(states)?;

        let uniform = 1.0 / self.nb_actions as f64;
        let mut probs = Array2::zeros((states.len(), self.nb_actions));
        let mut actions = Vec::with_capacity(states.len());

        for (i, (row, count)) in values.outer_iter().zip(counts).enumerate() {
            let eps = self.epsilon_from_count(count);
            let greedy = argmax(row);

            let mut p = probs.row_mut(i);
            p.fill(eps * uniform);
            p[greedy] += 1.0 - eps;

            let action = if rng.gen::<f64>() < eps {
                rng.gen_range(0..self.nb_actions)
            } else {
                greedy
            };
            actions.push(action);
        }

        self.visits.increment_batch(states)?;
        Ok(BatchSelection { actions, probs })
    }

    fn probabilities(&self, state: usize, values: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        check_len(self.nb_actions, values.len())?;
        let eps = self.epsilon(state)?;
        let mut probs = Array1::from_elem(self.nb_actions, eps / self.nb_actions as f64);
        probs[argmax(values)] += 1.0 - eps;
        Ok(probs)
    }

    fn counted_visits(&self) -> f64 {
        self.visits.counts().sum()
    }
}

/// UCB1 over per-state-action counts.
///
/// Score: `Q[s, a] + sqrt(2 ln(t) / Nsa[s, a])` where `t` is incremented once
/// per call before scoring, and `Nsa` starts at 1.
#[derive(Debug, Clone)]
pub struct Ucb1 {
    nb_actions: usize,
    timestep: u64,
    nsa: StateActionCounter,
}

impl Ucb1 {
    /// Create a policy over `nb_states x nb_actions` pairs
    pub fn new(nb_states: usize, nb_actions: usize) -> Result<Self> {
        if nb_actions == 0 {
            return Err(RLError::config("UCB1 needs at least one action"));
        }
        Ok(Self {
            nb_actions,
            timestep: 0,
            nsa: StateActionCounter::new(nb_states, nb_actions, 1.0),
        })
    }

    /// Number of selection calls so far
    #[must_use]
    pub fn timestep(&self) -> u64 {
        self.timestep
    }

    /// Per-state-action selection counts (initialised to 1)
    #[must_use]
    pub fn counts(&self) -> &StateActionCounter {
        &self.nsa
    }

    /// Selection scores of every action in `state` at timestep `t`
    pub fn scores(&self, state: usize, values: ArrayView1<'_, f64>, t: u64) -> Result<Array1<f64>> {
        check_len(self.nb_actions, values.len())?;
        let log_t = (t.max(1) as f64).ln();
        let mut scores = Array1::zeros(self.nb_actions);
        for (a, score) in scores.iter_mut().enumerate() {
            let n = self.nsa.get((state, a))?;
            *score = values[a] + (2.0 * log_t / n).sqrt();
        }
        Ok(scores)
    }
}

impl ExplorationPolicy for Ucb1 {
    fn name(&self) -> &'static str {
        "ucb1"
    }

    fn nb_actions(&self) -> usize {
        self.nb_actions
    }

    fn select_batch(
        &mut self,
        states: &[usize],
        values: ArrayView2<'_, f64>,
        _rng: &mut dyn RngCore,
    ) -> Result<BatchSelection> {
        check_values(states, &values, self.nb_actions)?;
        if states.is_empty() {
            return Ok(BatchSelection {
                actions: Vec::new(),
                probs: Array2::zeros((0, self.nb_actions)),
            });
        }
        for &state in states {
            self.nsa.check((state, 0))?;
        }

        self.timestep += 1;
        let mut probs = Array2::zeros((states.len(), self.nb_actions));
        let mut actions = Vec::with_capacity(states.len());
        for (i, (&state, row)) in states.iter().zip(values.outer_iter()).enumerate() {
            let action = argmax(self.scores(state, row, self.timestep)?.view());
            probs[(i, action)] = 1.0;
            actions.push(action);
        }

        let pairs: Vec<_> = states.iter().copied().zip(actions.iter().copied()).collect();
        self.nsa.increment_batch(&pairs)?;
        Ok(BatchSelection { actions, probs })
    }

    fn probabilities(&self, state: usize, values: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        let scores = self.scores(state, values, self.timestep + 1)?;
        Ok(one_hot(self.nb_actions, argmax(scores.view())))
    }

    fn counted_visits(&self) -> f64 {
        // Every pair starts at 1
        let (nb_states, nb_actions) = self.nsa.shape();
        self.nsa.counts().sum() - (nb_states * nb_actions) as f64
    }
}

/// Pure argmax policy used when playing without exploration
#[derive(Debug, Clone)]
pub struct Greedy {
    nb_actions: usize,
}

impl Greedy {
    /// Create a greedy policy
    #[must_use]
    pub fn new(nb_actions: usize) -> Self {
        Self { nb_actions }
    }
}

impl ExplorationPolicy for Greedy {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn nb_actions(&self) -> usize {
        self.nb_actions
    }

    fn select_batch(
        &mut self,
        states: &[usize],
        values: ArrayView2<'_, f64>,
        _rng: &mut dyn RngCore,
    ) -> Result<BatchSelection> {
        check_values(states, &values, self.nb_actions)?;
        let actions: Vec<usize> = values.outer_iter().map(argmax).collect();
        let mut probs = Array2::zeros((states.len(), self.nb_actions));
        for (i, &a) in actions.iter().enumerate() {
            probs[(i, a)] = 1.0;
        }
        Ok(BatchSelection { actions, probs })
    }

    fn probabilities(&self, _state: usize, values: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        check_len(self.nb_actions, values.len())?;
        Ok(one_hot(self.nb_actions, argmax(values)))
    }

    fn counted_visits(&self) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_eps_zero_picks_lowest_tied_action() {
        let mut policy = EpsilonGreedy::new(1, 2, 0.0, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let q = array![[0.0, 0.0]];

        for _ in 0..50 {
            let sel = policy.select(0, q.row(0), &mut rng).unwrap();
            assert_eq!(sel.action, 0);
            assert_eq!(sel.probs, array![1.0, 0.0]);
        }
        assert_eq!(policy.visits().get(0).unwrap(), 50.0);
    }

    #[test]
    fn test_min_eps_one_is_uniform() {
        let mut policy = EpsilonGreedy::new(2, 4, 3.0, 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let row = array![5.0, 0.0, 0.0, 0.0];

        let mut seen = [0usize; 4];
        for _ in 0..400 {
            let sel = policy.select(1, row.view(), &mut rng).unwrap();
            for p in sel.probs.iter() {
                assert_abs_diff_eq!(*p, 0.25, epsilon = 1e-12);
            }
            seen[sel.action] += 1;
        }
        assert!(seen.iter().all(|&n| n > 50));
    }

    #[test]
    fn test_huge_n0_keeps_eps_near_one() {
        let mut policy = EpsilonGreedy::new(1, 2, 1e12, 0.01).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            policy.select(0, array![1.0, 0.0].view(), &mut rng).unwrap();
        }
        assert!(policy.epsilon(0).unwrap() > 0.999_999);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let mut policy = EpsilonGreedy::new(1, 3, 1.0, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        // N = 0 -> eps = 1; N = 1 -> eps = 0.5
        policy.select(0, array![0.0, 2.0, 1.0].view(), &mut rng).unwrap();
        let sel = policy.select(0, array![0.0, 2.0, 1.0].view(), &mut rng).unwrap();

        assert_abs_diff_eq!(sel.probs.sum(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sel.probs[1], 0.5 + 0.5 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sel.probs[0], 0.5 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_batch_counts_every_repeat() {
        let mut policy = EpsilonGreedy::new(3, 2, 10.0, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let values = array![[0.0, 1.0], [0.0, 1.0], [1.0, 0.0]];

        let batch = policy.select_batch(&[2, 2, 0], values.view(), &mut rng).unwrap();
        assert_eq!(batch.actions.len(), 3);
        assert_eq!(batch.probs.dim(), (3, 2));
        assert_eq!(policy.visits().get(2).unwrap(), 2.0);
        assert_eq!(policy.visits().get(0).unwrap(), 1.0);
        assert_eq!(policy.visits().get(1).unwrap(), 0.0);
    }

    #[test]
    fn test_out_of_range_state_is_an_error() {
        let mut policy = EpsilonGreedy::new(2, 2, 1.0, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let err = policy.select(2, array![0.0, 0.0].view(), &mut rng).unwrap_err();
        assert!(matches!(err, RLError::IndexOutOfBounds { kind: "state", .. }));
        assert!(EpsilonGreedy::new(2, 2, 1.0, 1.5).is_err());
    }

    #[test]
    fn test_ucb_first_call_is_greedy_on_q() {
        let mut ucb = Ucb1::new(1, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        // ln(1) = 0, so the bonus vanishes on the first call.
        let sel = ucb.select(0, array![0.0, 2.0, 1.0].view(), &mut rng).unwrap();
        assert_eq!(sel.action, 1);
        assert_eq!(sel.probs, array![0.0, 1.0, 0.0]);
        assert_eq!(ucb.timestep(), 1);
        assert_eq!(ucb.counts().get((0, 1)).unwrap(), 2.0);
    }

    #[test]
    fn test_ucb_bonus_rotates_through_untried_actions() {
        let mut ucb = Ucb1::new(1, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let q = array![0.0, 0.0];

        assert_eq!(ucb.select(0, q.view(), &mut rng).unwrap().action, 0);
        // t = 2: action 0 has Nsa = 2, action 1 still 1 -> larger bonus
        assert_eq!(ucb.select(0, q.view(), &mut rng).unwrap().action, 1);
        assert_eq!(ucb.counts().get((0, 0)).unwrap(), 2.0);
        assert_eq!(ucb.counts().get((0, 1)).unwrap(), 2.0);
    }

    #[test]
    fn test_ucb_is_deterministic_given_counters() {
        let q = array![0.3, 0.1, 0.2];
        let mut a = Ucb1::new(2, 3).unwrap();
        let mut b = a.clone();
        let mut rng_a = StdRng::seed_from_u64(1);
        let mut rng_b = StdRng::seed_from_u64(99);

        for _ in 0..20 {
            let sa = a.select(1, q.view(), &mut rng_a).unwrap();
            let sb = b.select(1, q.view(), &mut rng_b).unwrap();
            assert_eq!(sa, sb);
        }
    }

    #[test]
    fn test_ucb_batch_increments_once_per_call() {
        let mut ucb = Ucb1::new(2, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let values = array![[1.0, 0.0], [1.0, 0.0]];

        let batch = ucb.select_batch(&[0, 0], values.view(), &mut rng).unwrap();
        assert_eq!(batch.actions, vec![0, 0]);
        assert_eq!(ucb.timestep(), 1);
        assert_eq!(ucb.counts().get((0, 0)).unwrap(), 3.0);
    }

    #[test]
    fn test_ucb_empty_batch_keeps_the_timestep() {
        let mut ucb = Ucb1::new(1, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let batch = ucb
            .select_batch(&[], Array2::zeros((0, 2)).view(), &mut rng)
            .unwrap();
        assert!(batch.actions.is_empty());
        assert_eq!(batch.probs.dim(), (0, 2));
        assert_eq!(ucb.timestep(), 0);

        // Still behaves as the first call: ln(1) = 0, pure argmax on Q
        let sel = ucb.select(0, array![0.0, 1.0].view(), &mut rng).unwrap();
        assert_eq!(sel.action, 1);
        assert_eq!(ucb.timestep(), 1);
    }

    #[test]
    fn test_probabilities_leave_counters_untouched() {
        let mut rng = StdRng::seed_from_u64(5);
        let q = array![0.0, 1.0];

        let mut eps = EpsilonGreedy::new(1, 2, 1.0, 0.0).unwrap();
        assert_eq!(eps.probabilities(0, q.view()).unwrap(), array![0.5, 0.5]);
        eps.select(0, q.view(), &mut rng).unwrap();
        // N = 1: eps = 1 / (1 + 1)
        let expected = eps.probabilities(0, q.view()).unwrap();
        assert_eq!(expected, array![0.25, 0.75]);
        assert_eq!(eps.select(0, q.view(), &mut rng).unwrap().probs, expected);
        assert_eq!(eps.counted_visits(), 2.0);

        let mut ucb = Ucb1::new(1, 2).unwrap();
        let peeked = ucb.probabilities(0, q.view()).unwrap();
        assert_eq!(ucb.timestep(), 0);
        assert_eq!(ucb.counted_visits(), 0.0);
        assert_eq!(ucb.select(0, q.view(), &mut rng).unwrap().probs, peeked);
        assert_eq!(ucb.counted_visits(), 1.0);

        let greedy = Greedy::new(2);
        assert_eq!(greedy.probabilities(0, q.view()).unwrap(), array![0.0, 1.0]);
        assert!(greedy.probabilities(0, array![1.0].view()).is_err());
    }
}
