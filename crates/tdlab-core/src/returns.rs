//! Return estimators over a single episode's rewards
//!
//! `rewards[t]` is the reward received after acting at step `t` and
//! `estimates[t]` is the bootstrap value observed right after that step
//! (typically `Q(s[t+1], a[t+1])`). With `T = rewards.len() - 1`:
//!
//! - Monte-Carlo: `G[t] = sum_{k=t..=T} d^(k-t) r[k]`
//! - n-step: `G[t] = sum_{k=t..=min(t+n-1, T)} d^(k-t) r[k] + [t+n <= T+1] d^n estimates[t+n-1]`
//! - lambda: `G[t] = (1-l) sum_{n=1..=T-t} l^(n-1) G^(n)[t] + l^(T-t) G_mc[t]`
//!
//! Each estimator exists as a plain loop and as a coefficient-matrix product;
//! both must agree element-wise.

use ndarray::{Array1, Array2};

use crate::error::{check_len, RLError};
use crate::Result;

fn check_discount(discount: f64) -> Result<()> {
    if (0.0..=1.0).contains(&discount) {
        Ok(())
    } else {
        Err(RLError::config(format!("discount must lie in [0, 1], got {discount}")))
    }
}

fn check_lambda(lambda: f64) -> Result<()> {
    if (0.0..=1.0).contains(&lambda) {
        Ok(())
    } else {
        Err(RLError::config(format!("lambda must lie in [0, 1], got {lambda}")))
    }
}

fn check_n_step(n_step: usize) -> Result<()> {
    if n_step == 0 {
        Err(RLError::config("n_step must be at least 1"))
    } else {
        Ok(())
    }
}

/// Discounted reward-to-go, `G[T] = r[T]`, `G[t] = r[t] + d G[t+1]`
#[must_use]
pub fn monte_carlo_returns(rewards: &[f64], discount: f64) -> Array1<f64> {
    let mut returns = Array1::zeros(rewards.len());
    let mut running = 0.0;
    for t in (0..rewards.len()).rev() {
        running = rewards[t] + discount * running;
        returns[t] = running;
    }
    returns
}

/// n-step returns computed step by step
pub fn n_step_returns(
    rewards: &[f64],
    estimates: &[f64],
    discount: f64,
    n_step: usize,
) -> Result<Array1<f64>> {
    check_len(rewards.len(), estimates.len())?;
    check_discount(discount)?;
    check_n_step(n_step)?;

    let len = rewards.len();
    let mut returns = Array1::zeros(len);
    for t in 0..len {
        let (end, mut g) = if t + n_step <= len {
            (t + n_step, estimates[t + n_step - 1])
        } else {
            (len, 0.0)
        };
        for k in (t..end).rev() {
            g = rewards[k] + discount * g;
        }
        returns[t] = g;
    }
    Ok(returns)
}

/// n-step returns as `r . C + e . P`.
///
/// `C[k, t] = d^(k-t)` for `t <= k < t+n`, and `P[k, t] = d^n` for `k = t+n-1`.
pub fn n_step_returns_matrix(
    rewards: &[f64],
    estimates: &[f64],
    discount: f64,
    n_step: usize,
) -> Result<Array1<f64>> {
    check_len(rewards.len(), estimates.len())?;
    check_discount(discount)?;
    check_n_step(n_step)?;

    let len = rewards.len();
    let reward_coefs = Array2::from_shape_fn((len, len), |(k, t)| {
        if k >= t && k - t < n_step {
            discount.powi((k - t) as i32)
        } else {
            0.0
        }
    });
    let bootstrap = discount.powi(n_step as i32);
    let estimate_coefs = Array2::from_shape_fn((len, len), |(k, t)| {
        if k + 1 == t + n_step {
            bootstrap
        } else {
            0.0
        }
    });

    let r = Array1::from(rewards.to_vec());
    let e = Array1::from(estimates.to_vec());
    Ok(r.dot(&reward_coefs) + e.dot(&estimate_coefs))
}

/// Lambda-returns as the explicit weighted sum of n-step returns.
///
/// `lambda == 1` returns the Monte-Carlo return.
pub fn lambda_returns(
    rewards: &[f64],
    estimates: &[f64],
    discount: f64,
    lambda: f64,
) -> Result<Array1<f64>> {
    check_len(rewards.len(), estimates.len())?;
    check_discount(discount)?;
    check_lambda(lambda)?;
    if lambda == 1.0 {
        return Ok(monte_carlo_returns(rewards, discount));
    }

    let len = rewards.len();
    let mc = monte_carlo_returns(rewards, discount);
    let by_n = (1..len)
        .map(|n| n_step_returns(rewards, estimates, discount, n))
        .collect::<Result<Vec<_>>>()?;

    let mut returns = Array1::zeros(len);
    for t in 0..len {
        let horizon = len - 1 - t;
        let mut g = 0.0;
        for n in 1..=horizon {
            g += (1.0 - lambda) * lambda.powi(n as i32 - 1) * by_n[n - 1][t];
        }
        returns[t] = g + lambda.powi(horizon as i32) * mc[t];
    }
    Ok(returns)
}

/// Lambda-returns as `r . R + e . E` with closed-form coefficients:
/// `R[k, t] = (d l)^(k-t)` for `k >= t` and
/// `E[k, t] = (1-l) l^(k-t) d^(k-t+1)` for `t <= k < T`.
pub fn lambda_returns_matrix(
    rewards: &[f64],
    estimates: &[f64],
    discount: f64,
    lambda: f64,
) -> Result<Array1<f64>> {
    check_len(rewards.len(), estimates.len())?;
    check_discount(discount)?;
    check_lambda(lambda)?;
    if lambda == 1.0 {
        return Ok(monte_carlo_returns(rewards, discount));
    }

    let len = rewards.len();
    let reward_coefs = Array2::from_shape_fn((len, len), |(k, t)| {
        if k >= t {
            (discount * lambda).powi((k - t) as i32)
        } else {
            0.0
        }
    });
    let estimate_coefs = Array2::from_shape_fn((len, len), |(k, t)| {
        if k >= t && k + 1 < len {
            let m = (k - t) as i32;
            (1.0 - lambda) * lambda.powi(m) * discount.powi(m + 1)
        } else {
            0.0
        }
    });

    let r = Array1::from(rewards.to_vec());
    let e = Array1::from(estimates.to_vec());
    Ok(r.dot(&reward_coefs) + e.dot(&estimate_coefs))
}

/// Lambda-returns by the backward recurrence
/// `G[T] = r[T]`, `G[t] = r[t] + d ((1-l) e[t] + l G[t+1])`.
pub fn lambda_returns_recursive(
    rewards: &[f64],
    estimates: &[f64],
    discount: f64,
    lambda: f64,
) -> Result<Array1<f64>> {
    check_len(rewards.len(), estimates.len())?;
    check_discount(discount)?;
    check_lambda(lambda)?;
    if lambda == 1.0 {
        return Ok(monte_carlo_returns(rewards, discount));
    }

    let len = rewards.len();
    let mut returns = Array1::zeros(len);
    if len == 0 {
        return Ok(returns);
    }
    returns[len - 1] = rewards[len - 1];
    for t in (0..len - 1).rev() {
        returns[t] = rewards[t]
            + discount * ((1.0 - lambda) * estimates[t] + lambda * returns[t + 1]);
    }
    Ok(returns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_monte_carlo_half_discount() {
        let g = monte_carlo_returns(&[1.0, 1.0, 1.0], 0.5);
        assert_eq!(g, array![1.75, 1.5, 1.0]);
    }

    #[test]
    fn test_one_step_is_td_zero() {
        let g = n_step_returns(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0], 0.5, 1).unwrap();
        assert_eq!(g, array![6.0, 12.0, 18.0]);
    }

    #[test]
    fn test_n_step_tail_drops_bootstrap() {
        let rewards = [1.0, 1.0, 1.0, 1.0];
        let estimates = [5.0, 5.0, 5.0, 5.0];
        let g = n_step_returns(&rewards, &estimates, 1.0, 2).unwrap();
        // t=0..=2 bootstrap from estimates[t+1]; t=3 has one reward left
        assert_eq!(g, array![7.0, 7.0, 7.0, 1.0]);
    }

    #[test]
    fn test_matrix_matches_loop_on_fixed_episode() {
        let rewards = [0.5, -1.0, 2.0, 0.0, 1.0];
        let estimates = [0.1, 0.2, -0.3, 0.4, 0.0];
        for n in 1..=6 {
            let a = n_step_returns(&rewards, &estimates, 0.9, n).unwrap();
            let b = n_step_returns_matrix(&rewards, &estimates, 0.9, n).unwrap();
            for (x, y) in a.iter().zip(b.iter()) {
                assert_abs_diff_eq!(x, y, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_lambda_zero_is_one_step() {
        let rewards = [1.0, 0.0, 2.0];
        let estimates = [3.0, 4.0, 0.0];
        let g = lambda_returns(&rewards, &estimates, 0.5, 0.0).unwrap();
        let one = n_step_returns(&rewards, &estimates, 0.5, 1).unwrap();
        // The last step has no bootstrap under the lambda weighting.
        assert_abs_diff_eq!(g[0], one[0], epsilon = 1e-12);
        assert_abs_diff_eq!(g[1], one[1], epsilon = 1e-12);
        assert_abs_diff_eq!(g[2], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_lambda_one_is_exactly_monte_carlo() {
        let rewards = [1.0, -2.0, 0.5];
        let estimates = [9.0, 9.0, 9.0];
        let mc = monte_carlo_returns(&rewards, 0.7);
        assert_eq!(lambda_returns(&rewards, &estimates, 0.7, 1.0).unwrap(), mc);
        assert_eq!(lambda_returns_matrix(&rewards, &estimates, 0.7, 1.0).unwrap(), mc);
        assert_eq!(lambda_returns_recursive(&rewards, &estimates, 0.7, 1.0).unwrap(), mc);
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(n_step_returns(&[1.0], &[1.0], 0.9, 0).is_err());
        assert!(n_step_returns(&[1.0], &[], 0.9, 1).is_err());
        assert!(lambda_returns(&[1.0], &[1.0], 0.9, 1.5).is_err());
        assert!(lambda_returns_matrix(&[1.0], &[1.0], 1.2, 0.5).is_err());
    }

    #[test]
    fn test_empty_episode() {
        assert!(monte_carlo_returns(&[], 0.9).is_empty());
        assert!(n_step_returns_matrix(&[], &[], 0.9, 3).unwrap().is_empty());
        assert!(lambda_returns_recursive(&[], &[], 0.9, 0.5).unwrap().is_empty());
        assert!(lambda_returns(&[], &[], 0.9, 0.5).unwrap().is_empty());
    }
}
