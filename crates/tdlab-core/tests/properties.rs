//! Property tests for the return estimators and the counters behind the
//! exploration policies.

use approx::relative_eq;
use ndarray::Array2;
use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use tdlab_core::returns::{
    lambda_returns, lambda_returns_matrix, lambda_returns_recursive, monte_carlo_returns,
    n_step_returns, n_step_returns_matrix,
};
use tdlab_core::{Counter, EpsilonGreedy, ExplorationPolicy, Ucb1};

fn close(a: f64, b: f64) -> bool {
    relative_eq!(a, b, epsilon = 1e-6, max_relative = 1e-9)
}

fn episode() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (1usize..32).prop_flat_map(|len| {
        (
            prop::collection::vec(-10.0f64..10.0, len),
            prop::collection::vec(-10.0f64..10.0, len),
        )
    })
}

proptest! {
    #[test]
    fn lambda_one_matches_monte_carlo((rewards, estimates) in episode(), discount in 0.0f64..=1.0) {
        let mc = monte_carlo_returns(&rewards, discount);
        for g in [
            lambda_returns(&rewards, &estimates, discount, 1.0).unwrap(),
            lambda_returns_matrix(&rewards, &estimates, discount, 1.0).unwrap(),
            lambda_returns_recursive(&rewards, &estimates, discount, 1.0).unwrap(),
        ] {
            for (x, y) in g.iter().zip(mc.iter()) {
                prop_assert!(close(*x, *y));
            }
        }
    }

    #[test]
    fn full_horizon_n_step_matches_monte_carlo((rewards, estimates) in episode(), discount in 0.0f64..=1.0) {
        let mc = monte_carlo_returns(&rewards, discount);

        let zeros = vec![0.0; rewards.len()];
        let at_len = n_step_returns(&rewards, &zeros, discount, rewards.len()).unwrap();
        let beyond = n_step_returns(&rewards, &estimates, discount, rewards.len() + 1).unwrap();
        for ((x, y), z) in at_len.iter().zip(beyond.iter()).zip(mc.iter()) {
            prop_assert!(close(*x, *z));
            prop_assert!(close(*y, *z));
        }
    }

    #[test]
    fn n_step_matrix_matches_loop(
        (rewards, estimates) in episode(),
        discount in 0.0f64..=1.0,
        n_step in 1usize..40,
    ) {
        let a = n_step_returns(&rewards, &estimates, discount, n_step).unwrap();
        let b = n_step_returns_matrix(&rewards, &estimates, discount, n_step).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            prop_assert!(close(*x, *y));
        }
    }

    #[test]
    fn lambda_formulations_agree(
        (rewards, estimates) in episode(),
        discount in 0.0f64..=1.0,
        lambda in 0.0f64..1.0,
    ) {
        let weighted = lambda_returns(&rewards, &estimates, discount, lambda).unwrap();
        let matrix = lambda_returns_matrix(&rewards, &estimates, discount, lambda).unwrap();
        let recursive = lambda_returns_recursive(&rewards, &estimates, discount, lambda).unwrap();
        for t in 0..rewards.len() {
            prop_assert!(close(weighted[t], matrix[t]));
            prop_assert!(close(weighted[t], recursive[t]));
        }
    }

    #[test]
    fn epsilon_greedy_counts_every_visit(
        states in prop::collection::vec(0usize..4, 1..50),
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut policy = EpsilonGreedy::new(4, 3, 10.0, 0.05).unwrap();
        let values = Array2::<f64>::zeros((4, 3));
        for &s in &states {
            policy.select(s, values.row(s), &mut rng).unwrap();
        }
        for s in 0..4 {
            let expected = states.iter().filter(|&&x| x == s).count() as f64;
            prop_assert_eq!(policy.visits().get(s).unwrap(), expected);
        }
    }

    #[test]
    fn ucb_counts_start_at_one_and_track_choices(
        states in prop::collection::vec(0usize..3, 1..40),
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut policy = Ucb1::new(3, 2).unwrap();
        let values = Array2::<f64>::zeros((3, 2));
        let mut chosen = Array2::<f64>::ones((3, 2));
        for &s in &states {
            let a = policy.select(s, values.row(s), &mut rng).unwrap().action;
            chosen[(s, a)] += 1.0;
        }
        prop_assert_eq!(policy.counts().counts(), &chosen);
        prop_assert_eq!(policy.timestep(), states.len() as u64);
    }
}
