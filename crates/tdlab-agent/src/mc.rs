//! Every-visit Monte-Carlo control

use async_trait::async_trait;

use tdlab_core::returns::{lambda_returns_recursive, monte_carlo_returns};
use tdlab_core::{
    Discretizer, Environment, History, Observation, Record, Result, TabularLearner,
};

use crate::agent::{close_truncated, AgentCore, Exploration, TabularAgent};
use crate::config::{AgentConfig, MonteCarloConfig};
use crate::metrics::EpisodeReport;

/// Plays a whole episode, then moves every visited pair toward its return
/// with a `1 / N(s, a)` learning rate (a running average of returns).
pub struct MonteCarloAgent {
    config: MonteCarloConfig,
    core: AgentCore,
    learner: TabularLearner,
    history: History,
}

impl MonteCarloAgent {
    /// Create the agent over `discretizer.nb_states()` states
    pub fn new(
        config: MonteCarloConfig,
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
        let learner = TabularLearner::count_based(core.nb_states(), nb_actions);
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

    fn targets(&self, truncated: bool) -> Result<Vec<f64>> {
        let mut rewards = self.history.rewards();
        let estimates = self.history.estimates();
        close_truncated(&mut rewards, &estimates, self.config.discount, truncated);
        let targets = match self.config.lambda {
            Some(lambda) => {
                lambda_returns_recursive(&rewards, &estimates, self.config.discount, lambda)?
            }
            None => monte_carlo_returns(&rewards, self.config.discount),
        };
        Ok(targets.to_vec())
    }
}

#[async_trait]
impl<O: Observation + 'static> TabularAgent<O> for MonteCarloAgent {
    fn name(&self) -> &'static str {
        "monte_carlo"
    }

    fn config(&self) -> AgentConfig {
        AgentConfig::MonteCarlo(self.config.clone())
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

        let truncated = loop {
            let outcome = self.core.step(env, action).await?;
            let next = if outcome.is_last() {
                None
            } else {
                Some(self.core.act(outcome.next_state)?.action)
            };
            // Only a truncated episode needs the bootstrap of its last step
            let estimate = match next {
                Some(a) => self.core.q.get(outcome.next_state, a)?,
                None if outcome.truncated => self.core.q.greedy_value(outcome.next_state)?,
                None => 0.0,
            };
            self.history.push(Record {
                state,
                action,
                reward: outcome.reward,
                estimate,
            });

            match next {
                Some(a) => {
                    state = outcome.next_state;
                    action = a;
                }
                None => break outcome.truncated,
            }
        };

        let targets = self.targets(truncated)?;
        let loss = self.learner.update(
            &mut self.core.q,
            &self.history.states(),
            &self.history.actions(),
            ndarray::ArrayView1::from(&targets),
        )?;

        let score = self.history.total_reward();
        let steps = self.history.len();
        self.history.clear();
        Ok(self.core.finish(score, &[loss], steps, truncated))
    }
}
