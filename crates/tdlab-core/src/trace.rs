//! Eligibility traces over state-action pairs

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{check_index, check_len, RLError};
use crate::Result;

/// Update discipline applied to the visited pair after the decay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    /// `E[s, a] += 1`
    #[default]
    Accumulating,
    /// `E[s, a] = 1`
    Replacing,
    /// `E[s, a] += 1 - lr * d * l * E_old[s, a]`; only usable through
    /// [`crate::learner::DutchTraceLearner`]
    Dutch,
}

/// Decaying credit-assignment weights, same shape as the value table.
///
/// Every visit first decays the whole table by `discount * lambda`, then
/// bumps the visited pair according to the [`TraceKind`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityTraces {
    traces: Array2<f64>,
    decay: f64,
    kind: TraceKind,
}

impl EligibilityTraces {
    /// Create zeroed traces. Fails when `discount * lambda` leaves `[0, 1]`.
    pub fn new(
        nb_states: usize,
        nb_actions: usize,
        discount: f64,
        lambda: f64,
        kind: TraceKind,
    ) -> Result<Self> {
        let decay = discount * lambda;
        if !(discount >= 0.0 && lambda >= 0.0 && decay <= 1.0) {
            return Err(RLError::config(format!(
                "discount * lambda must lie in [0, 1], got {discount} * {lambda}"
            )));
        }
        Ok(Self {
            traces: Array2::zeros((nb_states, nb_actions)),
            decay,
            kind,
        })
    }

    /// Trace discipline
    #[must_use]
    pub fn kind(&self) -> TraceKind {
        self.kind
    }

    /// Per-step decay factor `discount * lambda`
    #[must_use]
    pub fn decay(&self) -> f64 {
        self.decay
    }

    /// Read-only view of the trace table
    #[must_use]
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.traces.view()
    }

    /// `E[state, action]`
    pub fn get(&self, state: usize, action: usize) -> Result<f64> {
        self.check(state, action)?;
        Ok(self.traces[(state, action)])
    }

    fn check(&self, state: usize, action: usize) -> Result<()> {
        let (nb_states, nb_actions) = self.traces.dim();
        check_index("state", state, nb_states)?;
        check_index("action", action, nb_actions)
    }

    /// Record a visit of an accumulating or replacing trace
    pub fn visit(&mut self, state: usize, action: usize) -> Result<()> {
        self.check(state, action)?;
        match self.kind {
            TraceKind::Accumulating => {
                self.traces *= self.decay;
                self.traces[(state, action)] += 1.0;
            }
            TraceKind::Replacing => {
                self.traces *= self.decay;
                self.traces[(state, action)] = 1.0;
            }
            TraceKind::Dutch => {
                return Err(RLError::config(
                    "dutch traces are only updated by their learning rule",
                ));
            }
        }
        Ok(())
    }

    /// Record a batch of visits, one decay per visit, in order
    pub fn visit_batch(&mut self, states: &[usize], actions: &[usize]) -> Result<()> {
        check_len(states.len(), actions.len())?;
        for (&s, &a) in states.iter().zip(actions) {
            self.check(s, a)?;
        }
        for (&s, &a) in states.iter().zip(actions) {
            self.visit(s, a)?;
        }
        Ok(())
    }

    /// Dutch update, reading the pair's trace before the decay
    pub(crate) fn visit_dutch(&mut self, state: usize, action: usize, lr: f64) -> Result<()> {
        self.check(state, action)?;
        let current = self.traces[(state, action)];
        self.traces *= self.decay;
        self.traces[(state, action)] += 1.0 - lr * self.decay * current;
        Ok(())
    }

    /// Zero every trace; called at each episode boundary
    pub fn reset(&mut self) {
        self.traces.fill(0.0);
    }
}
