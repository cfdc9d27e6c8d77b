//! One-step bootstrap targets
//!
//! All targets have the shape `r + d * next_value`; they differ only in how
//! the value of the next state is estimated. A terminal transition has no
//! next value.

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{check_index, check_len, RLError};
use crate::value::{argmax, ActionValues};
use crate::Result;

/// One observed transition as seen by a target computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Reward received
    pub reward: f64,
    /// State reached
    pub next_state: usize,
    /// Action selected in the next state (used by SARSA and Sigma)
    pub next_action: usize,
    /// Whether the next state is terminal
    pub done: bool,
}

/// How the next state's value is estimated
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetKind {
    /// `Q[s', a']` for the action actually selected
    Sarsa,
    /// `max_a Q[s', a]`
    QLearning,
    /// `sum_a pi(a|s') Q[s', a]`
    ExpectedSarsa,
    /// `sigma * sarsa + (1 - sigma) * expected_sarsa`
    Sigma {
        /// Interpolation weight towards SARSA
        sigma: f64,
    },
}

impl TargetKind {
    /// Whether the target needs the policy's next-state probabilities
    #[must_use]
    pub fn needs_probs(&self) -> bool {
        matches!(self, Self::ExpectedSarsa | Self::Sigma { .. })
    }

    /// Reject a sigma outside `[0, 1]`
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Sigma { sigma } if !(0.0..=1.0).contains(sigma) => Err(RLError::config(
                format!("sigma must lie in [0, 1], got {sigma}"),
            )),
            _ => Ok(()),
        }
    }
}

fn next_row<'a, Q: ActionValues + ?Sized>(
    q: &'a Q,
    transition: &Transition,
) -> Result<ArrayView1<'a, f64>> {
    let row = q.action_values(transition.next_state)?;
    check_index("action", transition.next_action, row.len())?;
    Ok(row)
}

fn expected_value(row: ArrayView1<'_, f64>, probs: ArrayView1<'_, f64>) -> Result<f64> {
    check_len(row.len(), probs.len())?;
    Ok(row.dot(&probs))
}

fn bootstrap(transition: &Transition, discount: f64, next_value: f64) -> f64 {
    if transition.done {
        transition.reward
    } else {
        transition.reward + discount * next_value
    }
}

/// SARSA target `r + d Q[s', a']`
pub fn td_target<Q: ActionValues + ?Sized>(
    q: &Q,
    transition: &Transition,
    discount: f64,
) -> Result<f64> {
    let row = next_row(q, transition)?;
    Ok(bootstrap(transition, discount, row[transition.next_action]))
}

/// Q-learning target `r + d max_a Q[s', a]`
pub fn q_learning_target<Q: ActionValues + ?Sized>(
    q: &Q,
    transition: &Transition,
    discount: f64,
) -> Result<f64> {
    let row = q.action_values(transition.next_state)?;
    let best = row.get(argmax(row)).copied().unwrap_or(0.0);
    Ok(bootstrap(transition, discount, best))
}

/// Expected-SARSA target `r + d sum_a probs[a] Q[s', a]`
pub fn expected_sarsa_target<Q: ActionValues + ?Sized>(
    q: &Q,
    transition: &Transition,
    next_probs: ArrayView1<'_, f64>,
    discount: f64,
) -> Result<f64> {
    let row = q.action_values(transition.next_state)?;
    let expected = expected_value(row, next_probs)?;
    Ok(bootstrap(transition, discount, expected))
}

/// Sigma target, a linear blend of the SARSA and Expected-SARSA estimates
pub fn sigma_target<Q: ActionValues + ?Sized>(
    q: &Q,
    transition: &Transition,
    next_probs: ArrayView1<'_, f64>,
    sigma: f64,
    discount: f64,
) -> Result<f64> {
    let row = next_row(q, transition)?;
    let expected = expected_value(row, next_probs)?;
    let blended = sigma * row[transition.next_action] + (1.0 - sigma) * expected;
    Ok(bootstrap(transition, discount, blended))
}

fn probs_row<'a>(probs: &'a Option<ArrayView2<'_, f64>>, i: usize) -> Result<ArrayView1<'a, f64>> {
    probs
        .as_ref()
        .map(|p| p.row(i))
        .ok_or_else(|| RLError::config("this target needs next-state action probabilities"))
}

/// Targets for a batch of transitions.
///
/// `next_probs` holds one row per transition and is required by
/// [`TargetKind::ExpectedSarsa`] and [`TargetKind::Sigma`].
pub fn compute_targets<Q: ActionValues + ?Sized>(
    kind: TargetKind,
    q: &Q,
    transitions: &[Transition],
    next_probs: Option<ArrayView2<'_, f64>>,
    discount: f64,
) -> Result<Array1<f64>> {
    kind.validate()?;
    if let Some(probs) = &next_probs {
        check_len(transitions.len(), probs.nrows())?;
    }

    let mut targets = Array1::zeros(transitions.len());
    for (i, transition) in transitions.iter().enumerate() {
        targets[i] = match kind {
            TargetKind::Sarsa => td_target(q, transition, discount)?,
            TargetKind::QLearning => q_learning_target(q, transition, discount)?,
            TargetKind::ExpectedSarsa => {
                expected_sarsa_target(q, transition, probs_row(&next_probs, i)?, discount)?
            }
            TargetKind::Sigma { sigma } => {
                sigma_target(q, transition, probs_row(&next_probs, i)?, sigma, discount)?
            }
        };
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::QTable;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn table() -> QTable {
        QTable::from_array(array![[0.0, 0.0], [1.0, 3.0]])
    }

    fn step(next_action: usize) -> Transition {
        Transition {
            reward: 1.0,
            next_state: 1,
            next_action,
            done: false,
        }
    }

    #[test]
    fn test_sarsa_and_q_learning() {
        let q = table();
        assert_abs_diff_eq!(td_target(&q, &step(0), 0.5).unwrap(), 1.5);
        assert_abs_diff_eq!(q_learning_target(&q, &step(0), 0.5).unwrap(), 2.5);
    }

    #[test]
    fn test_expected_and_sigma_blend() {
        let q = table();
        let probs = array![0.25, 0.75];
        let expected = expected_sarsa_target(&q, &step(0), probs.view(), 1.0).unwrap();
        assert_abs_diff_eq!(expected, 1.0 + 0.25 + 2.25);

        let sarsa = td_target(&q, &step(0), 1.0).unwrap();
        let s1 = sigma_target(&q, &step(0), probs.view(), 1.0, 1.0).unwrap();
        let s0 = sigma_target(&q, &step(0), probs.view(), 0.0, 1.0).unwrap();
        let half = sigma_target(&q, &step(0), probs.view(), 0.5, 1.0).unwrap();
        assert_abs_diff_eq!(s1, sarsa);
        assert_abs_diff_eq!(s0, expected);
        assert_abs_diff_eq!(half, 0.5 * (sarsa + expected));
    }

    #[test]
    fn test_terminal_has_no_bootstrap() {
        let q = table();
        let mut t = step(1);
        t.done = true;
        assert_eq!(td_target(&q, &t, 0.9).unwrap(), 1.0);
        assert_eq!(q_learning_target(&q, &t, 0.9).unwrap(), 1.0);
    }

    #[test]
    fn test_batch_targets() {
        let q = table();
        let transitions = [step(0), step(1)];
        let sarsa = compute_targets(TargetKind::Sarsa, &q, &transitions, None, 1.0).unwrap();
        assert_eq!(sarsa, array![2.0, 4.0]);

        let err = compute_targets(TargetKind::ExpectedSarsa, &q, &transitions, None, 1.0);
        assert!(matches!(err, Err(RLError::Configuration(_))));

        let probs = array![[1.0, 0.0], [0.0, 1.0]];
        let expected = compute_targets(
            TargetKind::ExpectedSarsa,
            &q,
            &transitions,
            Some(probs.view()),
            1.0,
        )
        .unwrap();
        assert_eq!(expected, sarsa);
    }

    #[test]
    fn test_bad_indices() {
        let q = table();
        assert!(td_target(&q, &step(2), 1.0).is_err());
        let mut t = step(0);
        t.next_state = 5;
        assert!(q_learning_target(&q, &t, 1.0).is_err());
    }
}
