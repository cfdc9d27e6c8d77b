//! Environment traits and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{DiscreteSpace, Observation, Reward};

/// Result of a single environment step
#[derive(Debug, Clone)]
pub struct Step<O> {
    /// Observation from the environment
    pub observation: O,
    /// Reward signal
    pub reward: Reward,
    /// Whether the episode reached a terminal state
    pub done: bool,
    /// Whether the episode was cut short (e.g., time limit)
    pub truncated: bool,
    /// Additional info from the environment
    pub info: StepInfo,
}

impl<O> Step<O> {
    /// Whether the episode is over, terminal or truncated
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.done || self.truncated
    }
}

/// Additional information from a step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepInfo {
    /// Custom fields
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl StepInfo {
    /// Info carrying a single field
    #[must_use]
    pub fn with(key: &str, value: impl Into<serde_json::Value>) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert(key.to_string(), value.into());
        Self { fields }
    }
}

/// Core environment trait.
///
/// Agents drive it strictly sequentially: `reset`, then `step` until a
/// step reports `done` or `truncated`.
#[async_trait]
pub trait Environment: Send + Sync {
    /// Observation type
    type Observation: Observation;

    /// Registry-style name, e.g. `"CliffWalking"`
    fn name(&self) -> &str;

    /// Get the action space
    fn action_space(&self) -> DiscreteSpace;

    /// Reset the environment
    async fn reset(&mut self) -> crate::Result<(Self::Observation, StepInfo)>;

    /// Take a step in the environment
    async fn step(&mut self, action: usize) -> crate::Result<Step<Self::Observation>>;

    /// Close the environment
    async fn close(&mut self) -> crate::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<E> Environment for Box<E>
where
    E: Environment + ?Sized,
{
    type Observation = E::Observation;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn action_space(&self) -> DiscreteSpace {
        (**self).action_space()
    }

    async fn reset(&mut self) -> crate::Result<(Self::Observation, StepInfo)> {
        (**self).reset().await
    }

    async fn step(&mut self, action: usize) -> crate::Result<Step<Self::Observation>> {
        (**self).step(action).await
    }

    async fn close(&mut self) -> crate::Result<()> {
        (**self).close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VectorObservation;

    struct Countdown {
        left: usize,
    }

    #[async_trait]
    impl Environment for Countdown {
        type Observation = VectorObservation;

        fn name(&self) -> &str {
            "Countdown"
        }

        fn action_space(&self) -> DiscreteSpace {
            DiscreteSpace::new(1)
        }

        async fn reset(&mut self) -> crate::Result<(Self::Observation, StepInfo)> {
            self.left = 2;
            Ok((VectorObservation::index(self.left), StepInfo::default()))
        }

        async fn step(&mut self, action: usize) -> crate::Result<Step<Self::Observation>> {
            self.action_space().check(action)?;
            self.left -= 1;
            Ok(Step {
                observation: VectorObservation::index(self.left),
                reward: Reward(-1.0),
                done: self.left == 0,
                truncated: false,
                info: StepInfo::with("left", self.left),
            })
        }
    }

    #[tokio::test]
    async fn test_boxed_environment_delegates() {
        let mut env: Box<dyn Environment<Observation = VectorObservation>> =
            Box::new(Countdown { left: 0 });
        assert_eq!(env.name(), "Countdown");

        let (obs, _) = env.reset().await.unwrap();
        assert_eq!(obs.data, vec![2.0]);
        assert!(env.step(1).await.is_err());

        let first = env.step(0).await.unwrap();
        assert!(!first.is_last());
        assert_eq!(first.info.fields["left"], 1);
        let last = env.step(0).await.unwrap();
        assert!(last.done && last.is_last());
        assert_eq!(last.reward.value(), -1.0);
    }
}
