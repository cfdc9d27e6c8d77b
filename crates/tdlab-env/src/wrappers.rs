//! Environment wrappers

use async_trait::async_trait;

use tdlab_core::{DiscreteSpace, Environment, Result, Step, StepInfo};

/// Time limit wrapper.
///
/// Marks the step that reaches `max_steps` as `truncated` unless the inner
/// environment already ended the episode there. `done` is never set by the
/// wrapper, so learners keep bootstrapping from the cut-off state.
pub struct TimeLimit<E> {
    /// Inner environment
    pub env: E,
    /// Maximum steps
    pub max_steps: usize,
    /// Steps taken since the last reset
    pub steps: usize,
}

impl<E> TimeLimit<E> {
    /// Create a new time limit wrapper
    pub fn new(env: E, max_steps: usize) -> Self {
        Self {
            env,
            max_steps,
            steps: 0,
        }
    }
}

#[async_trait]
impl<E> Environment for TimeLimit<E>
where
    E: Environment,
{
    type Observation = E::Observation;

    fn name(&self) -> &str {
        self.env.name()
    }

    fn action_space(&self) -> DiscreteSpace {
        self.env.action_space()
    }

    async fn reset(&mut self) -> Result<(Self::Observation, StepInfo)> {
        self.steps = 0;
        self.env.reset().await
    }

    async fn step(&mut self, action: usize) -> Result<Step<Self::Observation>> {
        let mut step = self.env.step(action).await?;
        self.steps += 1;

        if self.steps >= self.max_steps && !step.done {
            step.truncated = true;
        }
        Ok(step)
    }

    async fn close(&mut self) -> Result<()> {
        self.env.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classic::MountainCarEnv;
    use crate::toy::RandomWalk;

    #[tokio::test]
    async fn test_truncates_without_terminating() {
        let mut env = TimeLimit::new(MountainCarEnv::new(Some(0)), 3);
        env.reset().await.unwrap();
        assert!(!env.step(1).await.unwrap().is_last());
        assert!(!env.step(1).await.unwrap().is_last());

        let last = env.step(1).await.unwrap();
        assert!(last.truncated);
        assert!(!last.done);

        env.reset().await.unwrap();
        assert_eq!(env.steps, 0);
        assert!(!env.step(1).await.unwrap().truncated);
    }

    #[tokio::test]
    async fn test_terminal_step_is_not_truncated() {
        let mut env = TimeLimit::new(RandomWalk::new(3, 0.0, Some(0)).unwrap(), 1);
        env.reset().await.unwrap();
        let step = env.step(1).await.unwrap();
        assert!(step.done);
        assert!(!step.truncated);
        assert_eq!(env.name(), "RandomWalk");
    }
}
