//! Tabular TD(n) control
//!
//! Each step is recorded with the estimate `Q(s', a')` of the next selected
//! pair, or `max_a Q(s', a)` when the time limit cuts the episode there.
//! Once `n` records follow a step, that step is updated toward its n-step
//! return. When the episode ends, the steps that never saw `n` successors
//! are updated toward their remaining reward-to-go.

use async_trait::async_trait;
use ndarray::Array1;

use tdlab_core::returns::{monte_carlo_returns, n_step_returns};
use tdlab_core::{
    Discretizer, Environment, History, Observation, Record, Result, TabularLearner,
};

use crate::agent::{close_truncated, AgentCore, Exploration, TabularAgent};
use crate::config::{AgentConfig, TdNConfig};
use crate::metrics::EpisodeReport;

/// Streaming n-step Sarsa
pub struct TdNAgent {
    config: TdNConfig,
    core: AgentCore,
    learner: TabularLearner,
    history: History,
}

impl TdNAgent {
    /// Create the agent over `discretizer.nb_states()` states
    pub fn new(
        config: TdNConfig,
        discretizer: Box<dyn Discretizer>,
        nb_actions: usize,
        seed: Option<u64>,
    ) -> Result<Self> {
        config.validate()?;
        let exploration = Exploration::EpsilonGreedy {
            n0: config.n0,
            min_eps: config.min_eps,
        };
        let core = AgentCore::new(discretizer, nb_actions, config.initial_q_value, exploration, seed)?;
        let learner =
            TabularLearner::scheduled(core.nb_states(), nb_actions, config.lr, config.lr_decay_steps)?;
        Ok(Self {
            config,
            core,
            learner,
            history: History::new(),
        })
    }

    /// Learner driving the updates
    #[must_use]
    pub fn learner(&self) -> &TabularLearner {
        &self.learner
    }

    /// Update the step `n` records back, once it has `n` successors
    fn update_oldest(&mut self) -> Result<Option<f64>> {
        let n = self.config.n_step;
        if self.history.len() < n {
            return Ok(None);
        }
        let window = self.history.tail(n);
        let rewards: Vec<f64> = window.iter().map(|r| r.reward).collect();
        let estimates: Vec<f64> = window.iter().map(|r| r.estimate).collect();
        let target = n_step_returns(&rewards, &estimates, self.config.discount, n)?[0];
        let oldest = window[0];
        let loss = self.learner.update(
            &mut self.core.q,
            &[oldest.state],
            &[oldest.action],
            Array1::from_elem(1, target).view(),
        )?;
        Ok(Some(loss))
    }

    /// Update every step that never received its n-step return
    fn update_tail(&mut self, truncated: bool) -> Result<Option<f64>> {
        let pending = self.config.n_step.saturating_sub(1).min(self.history.len());
        if pending == 0 {
            return Ok(None);
        }
        let window = self.history.tail(pending);
        let mut rewards: Vec<f64> = window.iter().map(|r| r.reward).collect();
        let estimates: Vec<f64> = window.iter().map(|r| r.estimate).collect();
        close_truncated(&mut rewards, &estimates, self.config.discount, truncated);
        let targets = monte_carlo_returns(&rewards, self.config.discount);

        let states: Vec<usize> = window.iter().map(|r| r.state).collect();
        let actions: Vec<usize> = window.iter().map(|r| r.action).collect();
        let loss = self
            .learner
            .update(&mut self.core.q, &states, &actions, targets.view())?;
        Ok(Some(loss))
    }
}

#[async_trait]
impl<O: Observation + 'static> TabularAgent<O> for TdNAgent {
    fn name(&self) -> &'static str {
        "tdn"
    }

    fn config(&self) -> AgentConfig {
        AgentConfig::Tdn(self.config.clone())
    }

    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    async fn learn_from_episode(
        &mut self,
        env: &mut dyn Environment<Observation = O>,
    ) -> Result<EpisodeReport> {
        self.history.clear();
        let mut state = self.core.reset(env).await?;
        let mut action = self.core.act(state)?.action;
        let mut losses = Vec::new();

        let truncated = loop {
            let outcome = self.core.step(env, action).await?;
            let next = if outcome.is_last() {
                None
            } else {
                Some(self.core.act(outcome.next_state)?.action)
            };
            let estimate = match next {
                Some(a) => self.core.q.get(outcome.next_state, a)?,
                // Truncated: bootstrap from the table, no action is taken there
                None if !outcome.done => self.core.q.greedy_value(outcome.next_state)?,
                None => 0.0,
            };
            self.history.push(Record {
                state,
                action,
                reward: outcome.reward,
                estimate,
            });
            if let Some(loss) = self.update_oldest()? {
                losses.push(loss);
            }

            match next {
                Some(a) => {
                    state = outcome.next_state;
                    action = a;
                }
                None => break outcome.truncated,
            }
        };

        if let Some(loss) = self.update_tail(truncated)? {
            losses.push(loss);
        }
        let score = self.history.total_reward();
        let steps = self.history.len();
        self.history.clear();
        Ok(self.core.finish(score, &losses, steps, truncated))
    }
}
