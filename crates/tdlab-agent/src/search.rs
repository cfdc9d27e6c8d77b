//! Random hyperparameter search
//!
//! Every trial samples a configuration with [`AgentConfig::random`], trains a
//! fresh agent on a fresh environment and is ranked by the mean score of its
//! last `eval_window` episodes.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use tdlab_core::{Discretizer, Environment, Observation, RLError, Result};

use crate::agent::{build_agent, train};
use crate::config::{AgentConfig, AgentKind};
use crate::metrics::MemorySink;

/// Search budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Number of sampled configurations
    pub trials: usize,
    /// Training episodes per trial
    pub episodes: usize,
    /// Trailing episodes averaged into the trial score
    pub eval_window: usize,
    /// Seed of the configuration sampler and of every trial's agent
    pub seed: Option<u64>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            trials: 20,
            episodes: 200,
            eval_window: 20,
            seed: None,
        }
    }
}

/// Outcome of one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Trial identifier
    pub id: Uuid,
    /// Sampled configuration
    pub config: AgentConfig,
    /// Mean score over the evaluation window
    pub mean_score: f64,
    /// Sample standard deviation over the evaluation window
    pub std_score: f64,
}

/// Random search over one agent family
#[derive(Debug, Clone)]
pub struct RandomSearch {
    kind: AgentKind,
    settings: SearchSettings,
}

impl RandomSearch {
    /// Create a search, rejecting an empty budget
    pub fn new(kind: AgentKind, settings: SearchSettings) -> Result<Self> {
        if settings.trials == 0 || settings.episodes == 0 || settings.eval_window == 0 {
            return Err(RLError::config(
                "trials, episodes and eval_window must all be at least 1",
            ));
        }
        Ok(Self { kind, settings })
    }

    /// Run every trial and return them best first.
    ///
    /// `make_env` is called once per trial and returns the environment with
    /// the discretizer matching it.
    pub async fn run<O, F>(&self, mut make_env: F) -> Result<Vec<TrialResult>>
    where
        O: Observation + 'static,
        F: FnMut() -> Result<(Box<dyn Environment<Observation = O>>, Box<dyn Discretizer>)>,
    {
        let mut sampler = match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut results = Vec::with_capacity(self.settings.trials);
        for trial in 0..self.settings.trials {
            let id = Uuid::new_v4();
            let config = AgentConfig::random(self.kind, &mut sampler);
            let (mut env, discretizer) = make_env()?;
            let nb_actions = env.action_space().n;
            let seed = self.settings.seed.map(|s| s.wrapping_add(trial as u64));

            let mut agent = build_agent(&config, discretizer, nb_actions, seed)?;
            let mut sink = MemorySink::new();
            train(agent.as_mut(), env.as_mut(), self.settings.episodes, &mut sink).await?;
            env.close().await?;

            let (mean_score, std_score) = sink
                .score_summary(self.settings.eval_window)
                .ok_or_else(|| RLError::Computation("trial recorded no episode".into()))?;
            info!(%id, trial, mean_score, std_score, "trial finished");
            results.push(TrialResult {
                id,
                config,
                mean_score,
                std_score,
            });
        }

        results.sort_by(|a, b| b.mean_score.total_cmp(&a.mean_score));
        Ok(results)
    }
}
