//! Agent contract and the state shared by every tabular agent

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tdlab_core::{
    argmax, Discretizer, EpsilonGreedy, Environment, ExplorationPolicy, Observation, QTable, RLError,
    Result, Selection, Ucb1, VectorObservation,
};

use crate::config::AgentConfig;
use crate::metrics::{EpisodeMode, EpisodeReport, MetricsSink};
use crate::{MonteCarloAgent, Td0Agent, TdLambdaAgent, TdNAgent};

/// Tabular agent driven episode by episode
#[async_trait]
pub trait TabularAgent<O: Observation + 'static = VectorObservation>: Send + Sync {
    /// Short identifier used in logs and metrics
    fn name(&self) -> &'static str;

    /// Configuration the agent was built from
    fn config(&self) -> AgentConfig;

    /// Shared tabular state
    fn core(&self) -> &AgentCore;

    /// Mutable shared tabular state
    fn core_mut(&mut self) -> &mut AgentCore;

    /// Play one episode with exploration and learning enabled
    async fn learn_from_episode(
        &mut self,
        env: &mut dyn Environment<Observation = O>,
    ) -> Result<EpisodeReport>;

    /// Play one greedy episode without touching the table or any counter
    async fn play_episode(
        &mut self,
        env: &mut dyn Environment<Observation = O>,
    ) -> Result<EpisodeReport> {
        self.core_mut().play(env).await
    }

    /// Current value table
    fn q_table(&self) -> &QTable {
        &self.core().q
    }

    /// Episodes learned from so far
    fn episode_id(&self) -> u64 {
        self.core().episode_id
    }

    /// Write the configuration and table as JSON
    async fn save(&self, path: &Path) -> Result<()> {
        let checkpoint = Checkpoint {
            config: self.config(),
            episode_id: self.core().episode_id,
            q: self.core().q.clone(),
        };
        let json = serde_json::to_string_pretty(&checkpoint)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Restore a table written by [`TabularAgent::save`]
    async fn load(&mut self, path: &Path) -> Result<()> {
        let json = tokio::fs::read_to_string(path).await?;
        let checkpoint: Checkpoint = serde_json::from_str(&json)?;
        if checkpoint.config.kind() != self.config().kind() {
            return Err(RLError::config(format!(
                "checkpoint holds a {} agent, not {}",
                checkpoint.config.kind(),
                self.config().kind()
            )));
        }
        let core = self.core_mut();
        if checkpoint.q.view().dim() != core.q.view().dim() {
            return Err(RLError::DimensionMismatch {
                expected: core.q.view().len(),
                actual: checkpoint.q.view().len(),
            });
        }
        core.q = checkpoint.q;
        core.episode_id = checkpoint.episode_id;
        Ok(())
    }
}

/// On-disk agent snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Configuration of the saved agent
    pub config: AgentConfig,
    /// Episodes learned from
    pub episode_id: u64,
    /// Value table
    pub q: QTable,
}

/// Tabular state every agent owns: the table, the exploration policy with
/// its counters, the observation discretizer and the random source.
pub struct AgentCore {
    pub(crate) q: QTable,
    pub(crate) policy: Box<dyn ExplorationPolicy>,
    pub(crate) discretizer: Box<dyn Discretizer>,
    pub(crate) rng: StdRng,
    pub(crate) episode_id: u64,
}

impl AgentCore {
    /// Build the table and an epsilon-greedy (or UCB1) policy over it
    pub fn new(
        discretizer: Box<dyn Discretizer>,
        nb_actions: usize,
        initial_q_value: f64,
        exploration: Exploration,
        seed: Option<u64>,
    ) -> Result<Self> {
        let nb_states = discretizer.nb_states();
        if nb_states == 0 || nb_actions == 0 {
            return Err(RLError::config("agents need at least one state and one action"));
        }
        let policy: Box<dyn ExplorationPolicy> = match exploration {
            Exploration::EpsilonGreedy { n0, min_eps } => {
                Box::new(EpsilonGreedy::new(nb_states, nb_actions, n0, min_eps)?)
            }
            Exploration::Ucb => Box::new(Ucb1::new(nb_states, nb_actions)?),
        };
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            q: QTable::new(nb_states, nb_actions, initial_q_value),
            policy,
            discretizer,
            rng,
            episode_id: 0,
        })
    }

    /// Number of discrete states
    #[must_use]
    pub fn nb_states(&self) -> usize {
        self.q.nb_states()
    }

    /// Exploration policy in use
    #[must_use]
    pub fn policy(&self) -> &dyn ExplorationPolicy {
        self.policy.as_ref()
    }

    pub(crate) fn state_of<O: Observation>(&self, observation: &O) -> Result<usize> {
        self.discretizer.state_index(observation.features())
    }

    /// Explore from `state`; the policy's counters are updated here.
    pub(crate) fn act(&mut self, state: usize) -> Result<Selection> {
        let values = tdlab_core::ActionValues::action_values(&self.q, state)?;
        self.policy.select(state, values, &mut self.rng)
    }

    /// Most probable action in `state` and the policy's current distribution.
    /// No visit is counted.
    pub(crate) fn peek(&self, state: usize) -> Result<Selection> {
        let values = tdlab_core::ActionValues::action_values(&self.q, state)?;
        let probs = self.policy.probabilities(state, values)?;
        Ok(Selection {
            action: argmax(probs.view()),
            probs,
        })
    }

    pub(crate) async fn reset<O: Observation>(
        &self,
        env: &mut dyn Environment<Observation = O>,
    ) -> Result<usize> {
        let (observation, _) = env.reset().await?;
        self.state_of(&observation)
    }

    pub(crate) async fn step<O: Observation>(
        &self,
        env: &mut dyn Environment<Observation = O>,
        action: usize,
    ) -> Result<Outcome> {
        let step = env.step(action).await?;
        let reward = step.reward.value();
        if !reward.is_finite() {
            return Err(RLError::Environment(format!("non-finite reward {reward}")));
        }
        Ok(Outcome {
            next_state: self.state_of(&step.observation)?,
            reward,
            done: step.done,
            truncated: step.truncated,
        })
    }

    /// Close a learning episode: bump the episode counter and build its report
    pub(crate) fn finish(
        &mut self,
        score: f64,
        losses: &[f64],
        steps: usize,
        truncated: bool,
    ) -> EpisodeReport {
        let loss = if losses.is_empty() {
            0.0
        } else {
            losses.iter().sum::<f64>() / losses.len() as f64
        };
        let report = EpisodeReport {
            episode_id: self.episode_id,
            mode: EpisodeMode::Train,
            score,
            loss,
            steps,
            truncated,
            finished_at: Utc::now(),
        };
        self.episode_id += 1;
        debug!(episode = report.episode_id, score, steps, "learned from episode");
        report
    }

    async fn play<O: Observation>(
        &mut self,
        env: &mut dyn Environment<Observation = O>,
    ) -> Result<EpisodeReport> {
        let mut state = self.reset(env).await?;
        let mut score = 0.0;
        let mut steps = 0;
        loop {
            let action = self.q.greedy_action(state)?;
            let outcome = self.step(env, action).await?;
            score += outcome.reward;
            steps += 1;
            if outcome.is_last() {
                return Ok(EpisodeReport {
                    episode_id: self.episode_id,
                    mode: EpisodeMode::Play,
                    score,
                    loss: 0.0,
                    steps,
                    truncated: outcome.truncated,
                    finished_at: Utc::now(),
                });
            }
            state = outcome.next_state;
        }
    }
}

/// Exploration policy selection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Exploration {
    /// `eps = max(N0 / (N0 + N[s]), min_eps)`
    EpsilonGreedy {
        /// Decay offset
        n0: f64,
        /// Floor
        min_eps: f64,
    },
    /// UCB1 over per-pair counts
    Ucb,
}

/// What one environment step produced, with the next state discretized
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Outcome {
    pub next_state: usize,
    pub reward: f64,
    pub done: bool,
    pub truncated: bool,
}

impl Outcome {
    pub fn is_last(&self) -> bool {
        self.done || self.truncated
    }
}

/// Add the bootstrap of a truncated episode to its last reward, so that a
/// plain reward-to-go becomes `sum d^k r + d^(T+1-t) estimate[T]`.
pub(crate) fn close_truncated(rewards: &mut [f64], estimates: &[f64], discount: f64, truncated: bool) {
    if truncated {
        if let (Some(last), Some(estimate)) = (rewards.last_mut(), estimates.last()) {
            *last += discount * estimate;
        }
    }
}

/// Build the agent described by `config`
pub fn build_agent<O: Observation + 'static>(
    config: &AgentConfig,
    discretizer: Box<dyn Discretizer>,
    nb_actions: usize,
    seed: Option<u64>,
) -> Result<Box<dyn TabularAgent<O>>> {
    config.validate()?;
    Ok(match config {
        AgentConfig::Td0(c) => Box::new(Td0Agent::new(c.clone(), discretizer, nb_actions, seed)?),
        AgentConfig::Tdn(c) => Box::new(TdNAgent::new(c.clone(), discretizer, nb_actions, seed)?),
        AgentConfig::TdLambda(c) => {
            Box::new(TdLambdaAgent::new(c.clone(), discretizer, nb_actions, seed)?)
        }
        AgentConfig::MonteCarlo(c) => {
            Box::new(MonteCarloAgent::new(c.clone(), discretizer, nb_actions, seed)?)
        }
    })
}

/// Learn from `episodes` episodes, reporting each one to `sink`
pub async fn train<O: Observation + 'static>(
    agent: &mut dyn TabularAgent<O>,
    env: &mut dyn Environment<Observation = O>,
    episodes: usize,
    sink: &mut dyn MetricsSink,
) -> Result<Vec<EpisodeReport>> {
    let mut reports = Vec::with_capacity(episodes);
    for _ in 0..episodes {
        let report = agent.learn_from_episode(env).await?;
        sink.record(&report);
        reports.push(report);
    }
    Ok(reports)
}

/// Play `episodes` greedy episodes
pub async fn play<O: Observation + 'static>(
    agent: &mut dyn TabularAgent<O>,
    env: &mut dyn Environment<Observation = O>,
    episodes: usize,
    sink: &mut dyn MetricsSink,
) -> Result<Vec<EpisodeReport>> {
    let mut reports = Vec::with_capacity(episodes);
    for _ in 0..episodes {
        let report = agent.play_episode(env).await?;
        sink.record(&report);
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_truncated() {
        let mut rewards = vec![1.0, 1.0];
        close_truncated(&mut rewards, &[0.0, 4.0], 0.5, false);
        assert_eq!(rewards, vec![1.0, 1.0]);
        close_truncated(&mut rewards, &[0.0, 4.0], 0.5, true);
        assert_eq!(rewards, vec![1.0, 3.0]);
    }
}
