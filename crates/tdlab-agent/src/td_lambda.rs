//! Tabular Sarsa(lambda) with accumulating, replacing or dutch traces

use async_trait::async_trait;

use tdlab_core::{
    Discretizer, DutchTraceLearner, EligibilityLearner, EligibilityTraces, Environment,
    Observation, Result, TabularLearner, TraceKind,
};

use crate::agent::{AgentCore, Exploration, TabularAgent};
use crate::config::{AgentConfig, TdLambdaConfig};
use crate::metrics::EpisodeReport;

enum TraceLearner {
    Backward(EligibilityLearner),
    TrueOnline(DutchTraceLearner),
}

/// Online backward-view agent. Traces are cleared at every episode start.
pub struct TdLambdaAgent {
    config: TdLambdaConfig,
    core: AgentCore,
    learner: TraceLearner,
}

impl TdLambdaAgent {
    /// Create the agent over `discretizer.nb_states()` states
    pub fn new(
        config: TdLambdaConfig,
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
        let nb_states = core.nb_states();
        let tabular =
            TabularLearner::scheduled(nb_states, nb_actions, config.lr, config.lr_decay_steps)?;
        let learner = match config.trace {
            TraceKind::Dutch => TraceLearner::TrueOnline(DutchTraceLearner::new(
                tabular,
                nb_states,
                nb_actions,
                config.discount,
                config.lambda,
            )?),
            kind => {
                let traces =
                    EligibilityTraces::new(nb_states, nb_actions, config.discount, config.lambda, kind)?;
                TraceLearner::Backward(EligibilityLearner::new(tabular, traces)?)
            }
        };
        Ok(Self {
            config,
            core,
            learner,
        })
    }

    /// Current traces
    #[must_use]
    pub fn traces(&self) -> &EligibilityTraces {
        match &self.learner {
            TraceLearner::Backward(l) => l.traces(),
            TraceLearner::TrueOnline(l) => l.traces(),
        }
    }

    fn reset_traces(&mut self) {
        match &mut self.learner {
            TraceLearner::Backward(l) => l.reset(),
            TraceLearner::TrueOnline(l) => l.reset(),
        }
    }

    fn update(&mut self, state: usize, action: usize, reward: f64, next_value: f64) -> Result<f64> {
        let target = reward + self.config.discount * next_value;
        match &mut self.learner {
            TraceLearner::Backward(l) => l.update(&mut self.core.q, state, action, target),
            TraceLearner::TrueOnline(l) => {
                l.update(&mut self.core.q, state, action, target, next_value)
            }
        }
    }
}

#[async_trait]
impl<O: Observation + 'static> TabularAgent<O> for TdLambdaAgent {
    fn name(&self) -> &'static str {
        "td_lambda"
    }

    fn config(&self) -> AgentConfig {
        AgentConfig::TdLambda(self.config.clone())
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
        self.reset_traces();
        let mut state = self.core.reset(env).await?;
        let mut action = self.core.act(state)?.action;
        let mut score = 0.0;
        let mut errors = Vec::new();

        let truncated = loop {
            let outcome = self.core.step(env, action).await?;
            score += outcome.reward;
            let next = if outcome.is_last() {
                None
            } else {
                Some(self.core.act(outcome.next_state)?.action)
            };
            let next_value = match next {
                Some(a) => self.core.q.get(outcome.next_state, a)?,
                // Truncated: bootstrap from the table, no action is taken there
                None if !outcome.done => self.core.q.greedy_value(outcome.next_state)?,
                None => 0.0,
            };
            errors.push(self.update(state, action, outcome.reward, next_value)?);

            match next {
                Some(a) => {
                    state = outcome.next_state;
                    action = a;
                }
                None => break outcome.truncated,
            }
        };

        Ok(self.core.finish(score, &errors, errors.len(), truncated))
    }
}
