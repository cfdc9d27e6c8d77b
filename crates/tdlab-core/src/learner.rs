//! Tabular learning rules
//!
//! [`TabularLearner`] regresses `Q[s, a]` toward externally computed targets.
//! [`EligibilityLearner`] spreads each TD error over recently visited pairs
//! through accumulating or replacing traces. [`DutchTraceLearner`] owns a
//! dutch trace together with the true-online update it was derived for; the
//! two are never exposed separately.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::counter::{Counter, StateActionCounter};
use crate::error::{check_len, RLError};
use crate::schedule::{Schedule, StaircaseDecay};
use crate::trace::{EligibilityTraces, TraceKind};
use crate::value::QTable;
use crate::Result;

/// Offset keeping the count-based rate finite on unvisited pairs
pub const COUNT_EPSILON: f64 = 1e-7;

/// Learning-rate policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LearningRate {
    /// `1 / (1e-7 + Nsa[s, a])`, counted before the rate is read
    CountBased,
    /// `init_lr * 0.5^floor(global_step / decay_steps)`, read before the step advances
    Staircase(StaircaseDecay),
}

/// Table regression with a count-based or scheduled learning rate
#[derive(Debug, Clone)]
pub struct TabularLearner {
    rate: LearningRate,
    nsa: StateActionCounter,
    global_step: u64,
}

impl TabularLearner {
    /// Count-based learner over `nb_states x nb_actions` pairs
    #[must_use]
    pub fn count_based(nb_states: usize, nb_actions: usize) -> Self {
        Self {
            rate: LearningRate::CountBased,
            nsa: StateActionCounter::new(nb_states, nb_actions, 0.0),
            global_step: 0,
        }
    }

    /// Learner whose rate halves every `decay_steps` updates
    pub fn scheduled(
        nb_states: usize,
        nb_actions: usize,
        init_lr: f64,
        decay_steps: u64,
    ) -> Result<Self> {
        if !(init_lr.is_finite() && init_lr > 0.0) {
            return Err(RLError::config(format!("lr must be positive, got {init_lr}")));
        }
        if decay_steps == 0 {
            return Err(RLError::config("lr_decay_steps must be at least 1"));
        }
        Ok(Self {
            rate: LearningRate::Staircase(StaircaseDecay::halving(init_lr, decay_steps)),
            nsa: StateActionCounter::new(nb_states, nb_actions, 0.0),
            global_step: 0,
        })
    }

    /// Learning-rate policy in use
    #[must_use]
    pub fn rate(&self) -> LearningRate {
        self.rate
    }

    /// Number of update calls so far
    #[must_use]
    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    /// Per-pair update counts (only advanced by the count-based policy)
    #[must_use]
    pub fn counts(&self) -> &StateActionCounter {
        &self.nsa
    }

    /// Advance the counters for one update call and return the rate of every pair.
    ///
    /// Count-based rates are read after the whole batch has been counted.
    fn advance(&mut self, pairs: &[(usize, usize)]) -> Result<Vec<f64>> {
        let rates = match self.rate {
            LearningRate::CountBased => {
                self.nsa.increment_batch(pairs)?;
                pairs
                    .iter()
                    .map(|&p| Ok(1.0 / (COUNT_EPSILON + self.nsa.get(p)?)))
                    .collect::<Result<Vec<_>>>()?
            }
            LearningRate::Staircase(schedule) => {
                vec![schedule.value(self.global_step); pairs.len()]
            }
        };
        self.global_step += 1;
        Ok(rates)
    }

    /// Move `Q[s, a]` toward `target` for every sample and return the signed
    /// mean error. Errors are read before any write; repeated pairs each
    /// apply their own update.
    pub fn update(
        &mut self,
        q: &mut QTable,
        states: &[usize],
        actions: &[usize],
        targets: ArrayView1<'_, f64>,
    ) -> Result<f64> {
        check_len(states.len(), actions.len())?;
        check_len(states.len(), targets.len())?;
        if states.is_empty() {
            return Ok(0.0);
        }

        let pairs: Vec<(usize, usize)> = states.iter().copied().zip(actions.iter().copied()).collect();
        let errors = pairs
            .iter()
            .zip(targets.iter())
            .map(|(&(s, a), &target)| Ok(target - q.get(s, a)?))
            .collect::<Result<Vec<f64>>>()?;
        let loss = errors.iter().sum::<f64>() / errors.len() as f64;

        let rates = self.advance(&pairs)?;
        for ((&(s, a), error), lr) in pairs.iter().zip(errors).zip(rates) {
            q.add(s, a, lr * error)?;
        }
        Ok(loss)
    }
}

/// Backward-view TD(lambda) with accumulating or replacing traces:
/// `Q += lr * delta * E` after the visited pair's trace is bumped.
#[derive(Debug, Clone)]
pub struct EligibilityLearner {
    learner: TabularLearner,
    traces: EligibilityTraces,
}

impl EligibilityLearner {
    /// Pair a learner with traces. Dutch traces are rejected.
    pub fn new(learner: TabularLearner, traces: EligibilityTraces) -> Result<Self> {
        if traces.kind() == TraceKind::Dutch {
            return Err(RLError::config("dutch traces require DutchTraceLearner"));
        }
        Ok(Self { learner, traces })
    }

    /// Underlying traces
    #[must_use]
    pub fn traces(&self) -> &EligibilityTraces {
        &self.traces
    }

    /// Underlying learner
    #[must_use]
    pub fn learner(&self) -> &TabularLearner {
        &self.learner
    }

    /// Apply one step and return the TD error `target - Q[s, a]`
    pub fn update(&mut self, q: &mut QTable, state: usize, action: usize, target: f64) -> Result<f64> {
        let error = target - q.get(state, action)?;
        self.traces.visit(state, action)?;
        let lr = self.learner.advance(&[(state, action)])?[0];
        q.values_mut().scaled_add(lr * error, &self.traces.view());
        Ok(error)
    }

    /// Clear the traces at an episode boundary
    pub fn reset(&mut self) {
        self.traces.reset();
    }
}

/// True-online TD(lambda) owning its dutch trace.
///
/// Per step, with `delta = target - Q[s, a]` and `lr` the current rate:
/// the dutch trace is bumped by `1 - lr * d * l * E_old[s, a]`, then
/// `Q += lr (delta + Q[s, a] - Q_old) E` and `Q[s, a] -= lr (Q[s, a] - Q_old)`,
/// and `Q_old` becomes the next pair's estimate.
#[derive(Debug, Clone)]
pub struct DutchTraceLearner {
    learner: TabularLearner,
    traces: EligibilityTraces,
    q_old: f64,
}

impl DutchTraceLearner {
    /// Build the learner and its dutch trace table
    pub fn new(
        learner: TabularLearner,
        nb_states: usize,
        nb_actions: usize,
        discount: f64,
        lambda: f64,
    ) -> Result<Self> {
        let traces = EligibilityTraces::new(nb_states, nb_actions, discount, lambda, TraceKind::Dutch)?;
        Ok(Self {
            learner,
            traces,
            q_old: 0.0,
        })
    }

    /// Underlying traces
    #[must_use]
    pub fn traces(&self) -> &EligibilityTraces {
        &self.traces
    }

    /// Underlying learner
    #[must_use]
    pub fn learner(&self) -> &TabularLearner {
        &self.learner
    }

    /// Apply one step. `next_value` is the bootstrap estimate inside `target`
    /// (0 on a terminal transition). Returns the TD error.
    pub fn update(
        &mut self,
        q: &mut QTable,
        state: usize,
        action: usize,
        target: f64,
        next_value: f64,
    ) -> Result<f64> {
        let current = q.get(state, action)?;
        let error = target - current;
        let lr = self.learner.advance(&[(state, action)])?[0];
        self.traces.visit_dutch(state, action, lr)?;

        let correction = current - self.q_old;
        q.values_mut().scaled_add(lr * (error + correction), &self.traces.view());
        q.add(state, action, -lr * correction)?;
        self.q_old = next_value;
        Ok(error)
    }

    /// Clear traces and the carried estimate at an episode boundary
    pub fn reset(&mut self) {
        self.traces.reset();
        self.q_old = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_count_based_first_visit_jumps_to_target() {
        let mut q = QTable::new(2, 2, 0.0);
        let mut learner = TabularLearner::count_based(2, 2);

        let loss = learner.update(&mut q, &[1], &[0], array![5.0].view()).unwrap();
        assert_eq!(loss, 5.0);
        assert_abs_diff_eq!(q.get(1, 0).unwrap(), 5.0 / (1.0 + 1e-7), epsilon = 1e-12);
        assert_eq!(learner.counts().get((1, 0)).unwrap(), 1.0);

        // Second visit averages
        learner.update(&mut q, &[1], &[0], array![1.0].view()).unwrap();
        assert_abs_diff_eq!(q.get(1, 0).unwrap(), 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_repeated_pairs_accumulate() {
        let mut q = QTable::new(1, 1, 0.0);
        let mut learner = TabularLearner::count_based(1, 1);
        learner
            .update(&mut q, &[0, 0], &[0, 0], array![1.0, 1.0].view())
            .unwrap();
        // Both samples read Nsa = 2 -> lr = 1/2 each
        assert_abs_diff_eq!(q.get(0, 0).unwrap(), 1.0, epsilon = 1e-6);

        let mut q = QTable::new(1, 1, 0.0);
        let mut learner = TabularLearner::scheduled(1, 1, 0.5, 100).unwrap();
        let loss = learner
            .update(&mut q, &[0, 0], &[0, 0], array![1.0, 3.0].view())
            .unwrap();
        assert_eq!(loss, 2.0);
        assert_abs_diff_eq!(q.get(0, 0).unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_signed_loss() {
        let mut q = QTable::new(1, 2, 1.0);
        let mut learner = TabularLearner::scheduled(1, 2, 0.1, 10).unwrap();
        let loss = learner
            .update(&mut q, &[0, 0], &[0, 1], array![0.0, 1.0].view())
            .unwrap();
        assert_eq!(loss, -0.5);
    }

    #[test]
    fn test_schedule_halves_by_global_step() {
        let mut q = QTable::new(1, 1, 0.0);
        let mut learner = TabularLearner::scheduled(1, 1, 1.0, 2).unwrap();
        for _ in 0..2 {
            learner.update(&mut q, &[0], &[0], array![0.0].view()).unwrap();
        }
        assert_eq!(learner.global_step(), 2);

        // Step 2 uses lr = 0.5
        learner.update(&mut q, &[0], &[0], array![4.0].view()).unwrap();
        assert_eq!(q.get(0, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_update_rejects_bad_input() {
        let mut q = QTable::new(1, 1, 0.0);
        let mut learner = TabularLearner::count_based(1, 1);
        assert!(learner.update(&mut q, &[0], &[0, 0], array![1.0].view()).is_err());
        assert!(learner.update(&mut q, &[3], &[0], array![1.0].view()).is_err());
        assert_eq!(learner.global_step(), 0);
        assert!(TabularLearner::scheduled(1, 1, 0.0, 10).is_err());
        assert!(TabularLearner::scheduled(1, 1, 0.1, 0).is_err());
    }

    #[test]
    fn test_traces_spread_the_error() {
        let mut q = QTable::new(2, 1, 0.0);
        let learner = TabularLearner::scheduled(2, 1, 0.5, 1_000).unwrap();
        let traces = EligibilityTraces::new(2, 1, 1.0, 0.5, TraceKind::Accumulating).unwrap();
        let mut el = EligibilityLearner::new(learner, traces).unwrap();

        el.update(&mut q, 0, 0, 0.0).unwrap();
        let error = el.update(&mut q, 1, 0, 2.0).unwrap();
        assert_eq!(error, 2.0);
        // E = [0.5, 1.0]
        assert_abs_diff_eq!(q.get(0, 0).unwrap(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(q.get(1, 0).unwrap(), 1.0, epsilon = 1e-12);

        el.reset();
        assert_eq!(el.traces().view().sum(), 0.0);
    }

    #[test]
    fn test_eligibility_learner_rejects_dutch() {
        let learner = TabularLearner::count_based(1, 1);
        let traces = EligibilityTraces::new(1, 1, 0.9, 0.9, TraceKind::Dutch).unwrap();
        assert!(EligibilityLearner::new(learner, traces).is_err());
    }

    #[test]
    fn test_dutch_with_zero_lambda_is_plain_td() {
        let steps = [(0, 1, 1.0, 0.5), (1, 0, 0.0, 0.2), (0, 1, 2.0, 0.0)];

        let mut q_plain = QTable::new(2, 2, 0.0);
        let mut plain = TabularLearner::scheduled(2, 2, 0.3, 1_000).unwrap();
        for &(s, a, target, _) in &steps {
            plain.update(&mut q_plain, &[s], &[a], array![target].view()).unwrap();
        }

        let mut q_dutch = QTable::new(2, 2, 0.0);
        let learner = TabularLearner::scheduled(2, 2, 0.3, 1_000).unwrap();
        let mut dutch = DutchTraceLearner::new(learner, 2, 2, 0.9, 0.0).unwrap();
        for &(s, a, target, next) in &steps {
            dutch.update(&mut q_dutch, s, a, target, next).unwrap();
        }

        for (x, y) in q_plain.view().iter().zip(q_dutch.view().iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_dutch_reset_clears_state() {
        let mut q = QTable::new(1, 1, 0.0);
        let learner = TabularLearner::scheduled(1, 1, 0.1, 10).unwrap();
        let mut dutch = DutchTraceLearner::new(learner, 1, 1, 0.9, 0.9).unwrap();
        dutch.update(&mut q, 0, 0, 1.0, 0.3).unwrap();
        assert!(dutch.traces().get(0, 0).unwrap() > 0.0);

        dutch.reset();
        assert_eq!(dutch.traces().get(0, 0).unwrap(), 0.0);
    }
}
