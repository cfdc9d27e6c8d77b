//! Typed agent configurations
//!
//! Keys keep their conventional names (`lr`, `N0`, `min_eps`, ...) so a
//! configuration file reads the same for every agent. Unknown keys are
//! rejected at parse time and out-of-range values by [`AgentConfig::validate`].

use std::fmt;
use std::str::FromStr;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tdlab_core::{RLError, Result, TargetKind, TraceKind};

const DEFAULT_LR_DECAY_STEPS: u64 = 100_000;

fn default_lr_decay_steps() -> u64 {
    DEFAULT_LR_DECAY_STEPS
}

fn default_target() -> TargetKind {
    TargetKind::Sarsa
}

fn check_unit(key: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RLError::config(format!("{key} must lie in [0, 1], got {value}")))
    }
}

fn check_lr(lr: f64, lr_decay_steps: u64) -> Result<()> {
    if !(lr.is_finite() && lr > 0.0) {
        return Err(RLError::config(format!("lr must be positive, got {lr}")));
    }
    if lr_decay_steps == 0 {
        return Err(RLError::config("lr_decay_steps must be at least 1"));
    }
    Ok(())
}

fn check_exploration(n0: f64, min_eps: f64) -> Result<()> {
    if !(n0.is_finite() && n0 >= 0.0) {
        return Err(RLError::config(format!("N0 must be non-negative, got {n0}")));
    }
    check_unit("min_eps", min_eps)
}

fn is_mountain_car(env_name: &str) -> bool {
    env_name.starts_with("MountainCar")
}

/// Tabular TD(0) control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Td0Config {
    /// Initial learning rate
    pub lr: f64,
    /// Updates between two halvings of the learning rate
    pub lr_decay_steps: u64,
    /// Discount factor
    pub discount: f64,
    /// Epsilon decay offset
    #[serde(rename = "N0")]
    pub n0: f64,
    /// Floor of the exploration rate
    pub min_eps: f64,
    /// Initial value of every table entry
    pub initial_q_value: f64,
    /// Explore with UCB1 instead of epsilon-greedy
    #[serde(rename = "UCB", default)]
    pub ucb: bool,
    /// Bootstrap target
    #[serde(default = "default_target")]
    pub target: TargetKind,
}

impl Td0Config {
    /// Tuned preset for a named environment (cart-pole by default)
    #[must_use]
    pub fn best_for(env_name: &str) -> Self {
        if is_mountain_car(env_name) {
            Self {
                lr: 0.1,
                lr_decay_steps: 100_000,
                discount: 1.0,
                n0: 100.0,
                min_eps: 0.001,
                initial_q_value: 0.0,
                ucb: false,
                target: TargetKind::Sarsa,
            }
        } else {
            Self {
                lr: 0.5,
                lr_decay_steps: 30_000,
                discount: 0.999,
                n0: 10.0,
                min_eps: 0.001,
                initial_q_value: 0.0,
                ucb: false,
                target: TargetKind::Sarsa,
            }
        }
    }

    /// Sample a configuration for random search
    pub fn random(rng: &mut dyn RngCore) -> Self {
        Self {
            lr: rng.gen_range(1e-2..0.9),
            lr_decay_steps: rng.gen_range(1_000..100_000),
            discount: rng.gen_range(0.98..=1.0),
            n0: f64::from(rng.gen_range(1u32..1_000)),
            min_eps: rng.gen_range(1e-4..2e-1),
            initial_q_value: 0.0,
            ucb: false,
            target: TargetKind::Sarsa,
        }
    }

    /// Range checks
    pub fn validate(&self) -> Result<()> {
        check_lr(self.lr, self.lr_decay_steps)?;
        check_unit("discount", self.discount)?;
        check_exploration(self.n0, self.min_eps)?;
        self.target.validate()
    }
}

/// Tabular TD(n) control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TdNConfig {
    /// Initial learning rate
    pub lr: f64,
    /// Updates between two halvings of the learning rate
    #[serde(default = "default_lr_decay_steps")]
    pub lr_decay_steps: u64,
    /// Discount factor
    pub discount: f64,
    /// Epsilon decay offset
    #[serde(rename = "N0")]
    pub n0: f64,
    /// Floor of the exploration rate
    pub min_eps: f64,
    /// Initial value of every table entry
    pub initial_q_value: f64,
    /// Rewards summed before bootstrapping
    pub n_step: usize,
}

impl TdNConfig {
    /// Tuned preset
    #[must_use]
    pub fn best_for(_env_name: &str) -> Self {
        Self {
            lr: 0.2,
            lr_decay_steps: DEFAULT_LR_DECAY_STEPS,
            discount: 0.999,
            n0: 76.0,
            min_eps: 0.001,
            initial_q_value: 0.0,
            n_step: 4,
        }
    }

    /// Sample a configuration for random search
    pub fn random(rng: &mut dyn RngCore) -> Self {
        Self {
            lr: rng.gen_range(1e-3..1.0),
            lr_decay_steps: rng.gen_range(1_000..100_000),
            discount: rng.gen_range(0.5..=1.0),
            n0: f64::from(rng.gen_range(1u32..5_000)),
            min_eps: rng.gen_range(1e-4..1e-1),
            initial_q_value: 0.0,
            n_step: rng.gen_range(1..200),
        }
    }

    /// Range checks
    pub fn validate(&self) -> Result<()> {
        check_lr(self.lr, self.lr_decay_steps)?;
        check_unit("discount", self.discount)?;
        check_exploration(self.n0, self.min_eps)?;
        if self.n_step == 0 {
            return Err(RLError::config("n_step must be at least 1"));
        }
        Ok(())
    }
}

/// Tabular Sarsa(lambda) with eligibility traces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TdLambdaConfig {
    /// Initial learning rate
    pub lr: f64,
    /// Updates between two halvings of the learning rate
    pub lr_decay_steps: u64,
    /// Discount factor
    pub discount: f64,
    /// Epsilon decay offset
    #[serde(rename = "N0")]
    pub n0: f64,
    /// Floor of the exploration rate
    pub min_eps: f64,
    /// Initial value of every table entry
    pub initial_q_value: f64,
    /// Trace decay
    pub lambda: f64,
    /// Trace discipline
    #[serde(default)]
    pub trace: TraceKind,
}

impl TdLambdaConfig {
    /// Tuned preset
    #[must_use]
    pub fn best_for(env_name: &str) -> Self {
        Self {
            lr: 0.1,
            lr_decay_steps: 50_000,
            discount: if is_mountain_car(env_name) { 1.0 } else { 0.999 },
            n0: 50.0,
            min_eps: 0.001,
            initial_q_value: 0.0,
            lambda: 0.9,
            trace: TraceKind::Accumulating,
        }
    }

    /// Sample a configuration for random search
    pub fn random(rng: &mut dyn RngCore) -> Self {
        let trace = match rng.gen_range(0..3) {
            0 => TraceKind::Accumulating,
            1 => TraceKind::Replacing,
            _ => TraceKind::Dutch,
        };
        Self {
            lr: rng.gen_range(1e-2..0.9),
            lr_decay_steps: rng.gen_range(1_000..100_000),
            discount: rng.gen_range(0.98..=1.0),
            n0: f64::from(rng.gen_range(1u32..1_000)),
            min_eps: rng.gen_range(1e-4..2e-1),
            initial_q_value: 0.0,
            lambda: rng.gen_range(0.0..1.0),
            trace,
        }
    }

    /// Range checks
    pub fn validate(&self) -> Result<()> {
        check_lr(self.lr, self.lr_decay_steps)?;
        check_unit("discount", self.discount)?;
        check_exploration(self.n0, self.min_eps)?;
        check_unit("lambda", self.lambda)
    }
}

/// Every-visit Monte-Carlo control with a count-based learning rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonteCarloConfig {
    /// Discount factor
    pub discount: f64,
    /// Epsilon decay offset
    #[serde(rename = "N0")]
    pub n0: f64,
    /// Floor of the exploration rate
    pub min_eps: f64,
    /// Initial value of every table entry
    pub initial_q_value: f64,
    /// Regress toward offline lambda-returns instead of full returns
    #[serde(default)]
    pub lambda: Option<f64>,
}

impl MonteCarloConfig {
    /// Tuned preset
    #[must_use]
    pub fn best_for(env_name: &str) -> Self {
        Self {
            discount: if is_mountain_car(env_name) { 1.0 } else { 0.999 },
            n0: 100.0,
            min_eps: 0.001,
            initial_q_value: 0.0,
            lambda: None,
        }
    }

    /// Sample a configuration for random search
    pub fn random(rng: &mut dyn RngCore) -> Self {
        Self {
            discount: rng.gen_range(0.98..=1.0),
            n0: f64::from(rng.gen_range(1u32..1_000)),
            min_eps: rng.gen_range(1e-4..2e-1),
            initial_q_value: 0.0,
            lambda: None,
        }
    }

    /// Range checks
    pub fn validate(&self) -> Result<()> {
        check_unit("discount", self.discount)?;
        check_exploration(self.n0, self.min_eps)?;
        match self.lambda {
            Some(lambda) => check_unit("lambda", lambda),
            None => Ok(()),
        }
    }
}

/// Agent family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// [`Td0Config`]
    Td0,
    /// [`TdNConfig`]
    Tdn,
    /// [`TdLambdaConfig`]
    TdLambda,
    /// [`MonteCarloConfig`]
    MonteCarlo,
}

impl AgentKind {
    /// Every agent family
    pub const ALL: [AgentKind; 4] = [Self::Td0, Self::Tdn, Self::TdLambda, Self::MonteCarlo];

    /// Identifier used in configuration files and on the command line
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Td0 => "td0",
            Self::Tdn => "tdn",
            Self::TdLambda => "td_lambda",
            Self::MonteCarlo => "monte_carlo",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = RLError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| RLError::config(format!("unknown agent {s:?}")))
    }
}

/// Configuration of any agent, tagged by `"agent"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "agent", rename_all = "snake_case")]
pub enum AgentConfig {
    /// TD(0)
    Td0(Td0Config),
    /// TD(n)
    Tdn(TdNConfig),
    /// TD(lambda)
    TdLambda(TdLambdaConfig),
    /// Monte-Carlo
    MonteCarlo(MonteCarloConfig),
}

impl AgentConfig {
    /// Agent family of this configuration
    #[must_use]
    pub fn kind(&self) -> AgentKind {
        match self {
            Self::Td0(_) => AgentKind::Td0,
            Self::Tdn(_) => AgentKind::Tdn,
            Self::TdLambda(_) => AgentKind::TdLambda,
            Self::MonteCarlo(_) => AgentKind::MonteCarlo,
        }
    }

    /// Discount factor shared by every family
    #[must_use]
    pub fn discount(&self) -> f64 {
        match self {
            Self::Td0(c) => c.discount,
            Self::Tdn(c) => c.discount,
            Self::TdLambda(c) => c.discount,
            Self::MonteCarlo(c) => c.discount,
        }
    }

    /// Range checks of the wrapped configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Td0(c) => c.validate(),
            Self::Tdn(c) => c.validate(),
            Self::TdLambda(c) => c.validate(),
            Self::MonteCarlo(c) => c.validate(),
        }
    }

    /// Tuned preset of `kind` for a named environment
    #[must_use]
    pub fn best_for(kind: AgentKind, env_name: &str) -> Self {
        match kind {
            AgentKind::Td0 => Self::Td0(Td0Config::best_for(env_name)),
            AgentKind::Tdn => Self::Tdn(TdNConfig::best_for(env_name)),
            AgentKind::TdLambda => Self::TdLambda(TdLambdaConfig::best_for(env_name)),
            AgentKind::MonteCarlo => Self::MonteCarlo(MonteCarloConfig::best_for(env_name)),
        }
    }

    /// Random configuration of `kind`
    pub fn random(kind: AgentKind, rng: &mut dyn RngCore) -> Self {
        match kind {
            AgentKind::Td0 => Self::Td0(Td0Config::random(rng)),
            AgentKind::Tdn => Self::Tdn(TdNConfig::random(rng)),
            AgentKind::TdLambda => Self::TdLambda(TdLambdaConfig::random(rng)),
            AgentKind::MonteCarlo => Self::MonteCarlo(MonteCarloConfig::random(rng)),
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_parse_td0_with_original_keys() {
        let json = r#"{
            "agent": "td0",
            "lr": 0.5, "lr_decay_steps": 30000, "discount": 0.999,
            "N0": 10, "min_eps": 0.001, "initial_q_value": 0
        }"#;
        let config = AgentConfig::from_json(json).unwrap();
        assert_eq!(config, AgentConfig::best_for(AgentKind::Td0, "CartPole"));
    }

    #[test]
    fn test_unknown_and_missing_keys_rejected() {
        let unknown = r#"{"agent": "monte_carlo", "discount": 1, "N0": 1, "min_eps": 0.1,
            "initial_q_value": 0, "epsilon": 0.3}"#;
        assert!(matches!(
            AgentConfig::from_json(unknown),
            Err(RLError::Serialization(_))
        ));

        let missing = r#"{"agent": "tdn", "lr": 0.1, "discount": 1, "N0": 1, "min_eps": 0.1,
            "initial_q_value": 0}"#;
        assert!(AgentConfig::from_json(missing).is_err());
    }

    #[test]
    fn test_validation() {
        let mut td0 = Td0Config::best_for("CartPole");
        td0.discount = 1.5;
        assert!(matches!(td0.validate(), Err(RLError::Configuration(_))));

        let mut tdn = TdNConfig::best_for("");
        tdn.n_step = 0;
        assert!(tdn.validate().is_err());

        let mut lambda = TdLambdaConfig::best_for("");
        lambda.lambda = 1.2;
        assert!(lambda.validate().is_err());

        let mut td0 = Td0Config::best_for("");
        td0.target = TargetKind::Sigma { sigma: -0.1 };
        assert!(td0.validate().is_err());
    }

    #[test]
    fn test_random_configs_are_valid() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            for kind in AgentKind::ALL {
                let config = AgentConfig::random(kind, &mut rng);
                assert_eq!(config.kind(), kind);
                config.validate().unwrap();
            }
        }
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in AgentKind::ALL {
            assert_eq!(kind.to_string().parse::<AgentKind>().unwrap(), kind);
        }
        assert!("dqn".parse::<AgentKind>().is_err());
    }

    #[test]
    fn test_mountain_car_preset() {
        let config = Td0Config::best_for("MountainCar");
        assert_eq!(config.discount, 1.0);
        assert_eq!(config.lr_decay_steps, 100_000);
    }
}
