//! Tabular TD(0) control: Sarsa, Q-learning, Expected-Sarsa and Sigma

use async_trait::async_trait;
use ndarray::{Array2, Axis};

use tdlab_core::{
    compute_targets, ActionValues, Discretizer, Environment, Observation, Result, TabularLearner,
    Transition,
};

use crate::agent::{AgentCore, Exploration, TabularAgent};
use crate::config::{AgentConfig, Td0Config};
use crate::metrics::EpisodeReport;

/// Online one-step agent. The next action is selected before the update so
/// that every target bootstraps from pre-update values.
pub struct Td0Agent {
    config: Td0Config,
    core: AgentCore,
    learner: TabularLearner,
}

impl Td0Agent {
    /// Create the agent over `discretizer.nb_states()` states
    pub fn new(
        config: Td0Config,
        discretizer: Box<dyn Discretizer>,
        nb_actions: usize,
        seed: Option<u64>,
    ) -> Result<Self> {
        config.validate()?;
        let exploration = if config.ucb {
            Exploration::Ucb
        } else {
            Exploration::EpsilonGreedy {
                n0: config.n0,
                min_eps: config.min_eps,
            }
        };
        let core = AgentCore::new(discretizer, nb_actions, config.initial_q_value, exploration, seed)?;
        let learner =
            TabularLearner::scheduled(core.nb_states(), nb_actions, config.lr, config.lr_decay_steps)?;
        Ok(Self {
            config,
            core,
            learner,
        })
    }

    /// Learner driving the updates
    #[must_use]
    pub fn learner(&self) -> &TabularLearner {
        &self.learner
    }
}

#[async_trait]
impl<O: Observation + 'static> TabularAgent<O> for Td0Agent {
    fn name(&self) -> &'static str {
        "td0"
    }

    fn config(&self) -> AgentConfig {
        AgentConfig::Td0(self.config.clone())
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
        let mut state = self.core.reset(env).await?;
        let mut selection = self.core.act(state)?;
        let mut score = 0.0;
        let mut losses = Vec::new();
        let truncated = loop {
            let action = selection.action;
            let outcome = self.core.step(env, action).await?;
            score += outcome.reward;

            // A truncated episode bootstraps from the next state, but no
            // action is taken there, so the policy only reports its distribution.
            let next = if outcome.done {
                None
            } else if outcome.truncated {
                Some(self.core.peek(outcome.next_state)?)
            } else {
                Some(self.core.act(outcome.next_state)?)
            };
            let transition = Transition {
                reward: outcome.reward,
                next_state: outcome.next_state,
                next_action: next.as_ref().map_or(0, |s| s.action),
                done: outcome.done,
            };
            let probs = match &next {
                Some(s) => s.probs.clone().insert_axis(Axis(0)),
                None => Array2::zeros((1, self.core.q.nb_actions())),
            };
            let targets = compute_targets(
                self.config.target,
                &self.core.q,
                &[transition],
                Some(probs.view()),
                self.config.discount,
            )?;
            let loss = self
                .learner
                .update(&mut self.core.q, &[state], &[action], targets.view())?;
            losses.push(loss);

            match next {
                Some(next) if !outcome.truncated => {
                    state = outcome.next_state;
                    selection = next;
                }
                _ => break outcome.truncated,
            }
        };

        Ok(self.core.finish(score, &losses, losses.len(), truncated))
    }
}
