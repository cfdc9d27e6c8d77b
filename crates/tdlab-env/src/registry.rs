//! Environment registry for creating environments by name

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tdlab_core::{Discretizer, Environment, RLError, Result, VectorObservation};

use crate::classic::{CartPoleEnv, MountainCarEnv};
use crate::toy::{CliffWalking, RandomWalk};
use crate::wrappers::TimeLimit;

/// Boxed environment as handed to agents
pub type BoxedEnv = Box<dyn Environment<Observation = VectorObservation>>;

/// Options shared by every registered environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvConfig {
    /// Seed of the environment's own randomness
    #[serde(default)]
    pub seed: Option<u64>,
    /// Overrides the environment's default time limit
    #[serde(default)]
    pub max_steps: Option<usize>,
    /// Environment-specific parameters
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl EnvConfig {
    /// Config with only a seed set
    #[must_use]
    pub fn seeded(seed: Option<u64>) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    fn param_f64(&self, key: &str, default: f64) -> Result<f64> {
        match self.params.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_f64()
                .ok_or_else(|| RLError::config(format!("parameter {key} must be a number"))),
        }
    }

    fn param_usize(&self, key: &str, default: usize) -> Result<usize> {
        match self.params.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_u64()
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| RLError::config(format!("parameter {key} must be a count"))),
        }
    }
}

/// Environment together with the discretizer matching its observations
pub struct EnvHandle {
    /// Time-limited environment
    pub env: BoxedEnv,
    /// Maps the environment's observations to table rows
    pub discretizer: Box<dyn Discretizer>,
}

impl EnvHandle {
    /// Wrap `env` in a [`TimeLimit`] of `config.max_steps`, or `default_limit`
    pub fn limited<E>(
        env: E,
        discretizer: impl Discretizer + 'static,
        config: &EnvConfig,
        default_limit: usize,
    ) -> Self
    where
        E: Environment<Observation = VectorObservation> + 'static,
    {
        let max_steps = config.max_steps.unwrap_or(default_limit);
        Self {
            env: Box::new(TimeLimit::new(env, max_steps)),
            discretizer: Box::new(discretizer),
        }
    }

    /// Split into the environment and its discretizer
    #[must_use]
    pub fn into_parts(self) -> (BoxedEnv, Box<dyn Discretizer>) {
        (self.env, self.discretizer)
    }
}

type EnvConstructor = Box<dyn Fn(&EnvConfig) -> Result<EnvHandle> + Send + Sync>;

/// Name-indexed environment constructors, listed in registration order
pub struct EnvRegistry {
    envs: IndexMap<String, EnvConstructor>,
}

impl EnvRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn empty() -> Self {
        Self {
            envs: IndexMap::new(),
        }
    }

    /// Registry holding the bundled environments
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("RandomWalk", |config| {
            let env = RandomWalk::new(
                config.param_usize("nb_states", 7)?,
                config.param_f64("slip", 0.1)?,
                config.seed,
            )?;
            let discretizer = env.discretizer();
            Ok(EnvHandle::limited(env, discretizer, config, 100))
        });
        registry.register("CliffWalking", |config| {
            let env = CliffWalking::new();
            let discretizer = env.discretizer();
            Ok(EnvHandle::limited(env, discretizer, config, 500))
        });
        registry.register("CartPole", |config| {
            let env = CartPoleEnv::new(config.seed);
            let discretizer = env.discretizer()?;
            Ok(EnvHandle::limited(env, discretizer, config, 200))
        });
        registry.register("MountainCar", |config| {
            let env = MountainCarEnv::new(config.seed);
            let discretizer = env.discretizer()?;
            Ok(EnvHandle::limited(env, discretizer, config, 200))
        });
        registry
    }

    /// Register an environment, replacing any previous one of the same name
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&EnvConfig) -> Result<EnvHandle> + Send + Sync + 'static,
    {
        self.envs.insert(name.into(), Box::new(constructor));
    }

    /// Create an environment by name
    pub fn make(&self, name: &str, config: &EnvConfig) -> Result<EnvHandle> {
        let constructor = self
            .envs
            .get(name)
            .ok_or_else(|| RLError::Environment(format!("Unknown environment: {name}")))?;
        debug!(env = name, seed = ?config.seed, "creating environment");
        constructor(config)
    }

    /// Whether `name` is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.envs.contains_key(name)
    }

    /// Registered names in registration order
    pub fn list(&self) -> Vec<&str> {
        self.envs.keys().map(String::as_str).collect()
    }
}

impl Default for EnvRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Create one of the bundled environments by name
pub fn make_env(name: &str, config: &EnvConfig) -> Result<EnvHandle> {
    EnvRegistry::with_defaults().make(name, config)
}
