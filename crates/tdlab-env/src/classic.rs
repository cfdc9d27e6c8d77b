//! Classic control environments
//!
//! Neither environment limits episode length itself; wrap them in
//! [`TimeLimit`](crate::TimeLimit) for that.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tdlab_core::{
    DiscreteSpace, Environment, GridDiscretizer, RLError, Result, Reward, Step, StepInfo,
    VectorObservation,
};

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// CartPole environment
pub struct CartPoleEnv {
    state: CartPoleState,
    config: CartPoleConfig,
    rng: StdRng,
    finished: bool,
}

#[derive(Debug, Clone, Default)]
struct CartPoleState {
    x: f64,         // Cart position
    x_dot: f64,     // Cart velocity
    theta: f64,     // Pole angle
    theta_dot: f64, // Pole angular velocity
}

#[derive(Debug, Clone)]
struct CartPoleConfig {
    gravity: f64,
    mass_cart: f64,
    mass_pole: f64,
    length: f64,
    force_mag: f64,
    tau: f64,
    x_threshold: f64,
    theta_threshold: f64,
}

impl Default for CartPoleConfig {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            mass_cart: 1.0,
            mass_pole: 0.1,
            length: 0.5,
            force_mag: 10.0,
            tau: 0.02,
            x_threshold: 2.4,
            theta_threshold: 12.0_f64.to_radians(),
        }
    }
}

impl CartPoleEnv {
    /// Create a new CartPole environment
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            state: CartPoleState::default(),
            config: CartPoleConfig::default(),
            rng: rng_from(seed),
            finished: false,
        }
    }

    /// Grid over cart position, cart velocity, pole angle and pole velocity
    pub fn discretizer(&self) -> Result<GridDiscretizer> {
        GridDiscretizer::new(
            vec![3, 3, 6, 6],
            vec![-self.config.x_threshold, -3.0, -self.config.theta_threshold, -3.5],
            vec![self.config.x_threshold, 3.0, self.config.theta_threshold, 3.5],
        )
    }

    fn observation(&self) -> VectorObservation {
        VectorObservation::new(vec![
            self.state.x,
            self.state.x_dot,
            self.state.theta,
            self.state.theta_dot,
        ])
    }

    fn is_done(&self) -> bool {
        self.state.x.abs() > self.config.x_threshold
            || self.state.theta.abs() > self.config.theta_threshold
    }
}

#[async_trait]
impl Environment for CartPoleEnv {
    type Observation = VectorObservation;

    fn name(&self) -> &str {
        "CartPole"
    }

    fn action_space(&self) -> DiscreteSpace {
        DiscreteSpace::new(2) // 0: push left, 1: push right
    }

    async fn reset(&mut self) -> Result<(Self::Observation, StepInfo)> {
        self.state = CartPoleState {
            x: self.rng.gen_range(-0.05..0.05),
            x_dot: self.rng.gen_range(-0.05..0.05),
            theta: self.rng.gen_range(-0.05..0.05),
            theta_dot: self.rng.gen_range(-0.05..0.05),
        };
        self.finished = false;
        Ok((self.observation(), StepInfo::default()))
    }

    async fn step(&mut self, action: usize) -> Result<Step<Self::Observation>> {
        self.action_space().check(action)?;
        if self.finished {
            return Err(RLError::Environment("step after the pole fell".into()));
        }

        let c = &self.config;
        let force = if action == 1 { c.force_mag } else { -c.force_mag };
        let (sin_theta, cos_theta) = self.state.theta.sin_cos();

        let total_mass = c.mass_cart + c.mass_pole;
        let pole_mass_length = c.mass_pole * c.length;

        let temp =
            (force + pole_mass_length * self.state.theta_dot.powi(2) * sin_theta) / total_mass;
        let theta_acc = (c.gravity * sin_theta - cos_theta * temp)
            / (c.length * (4.0 / 3.0 - c.mass_pole * cos_theta.powi(2) / total_mass));
        let x_acc = temp - pole_mass_length * theta_acc * cos_theta / total_mass;

        // Explicit Euler
        self.state.x += c.tau * self.state.x_dot;
        self.state.x_dot += c.tau * x_acc;
        self.state.theta += c.tau * self.state.theta_dot;
        self.state.theta_dot += c.tau * theta_acc;

        self.finished = self.is_done();
        Ok(Step {
            observation: self.observation(),
            reward: Reward(1.0),
            done: self.finished,
            truncated: false,
            info: StepInfo::default(),
        })
    }
}

/// Mountain Car environment
pub struct MountainCarEnv {
    state: MountainCarState,
    config: MountainCarConfig,
    rng: StdRng,
}

#[derive(Debug, Clone)]
struct MountainCarState {
    position: f64,
    velocity: f64,
}

#[derive(Debug, Clone)]
struct MountainCarConfig {
    min_position: f64,
    max_position: f64,
    max_speed: f64,
    goal_position: f64,
    force: f64,
    gravity: f64,
}

impl Default for MountainCarConfig {
    fn default() -> Self {
        Self {
            min_position: -1.2,
            max_position: 0.6,
            max_speed: 0.07,
            goal_position: 0.5,
            force: 0.001,
            gravity: 0.0025,
        }
    }
}

impl MountainCarEnv {
    /// Create a new Mountain Car environment
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            state: MountainCarState {
                position: -0.5,
                velocity: 0.0,
            },
            config: MountainCarConfig::default(),
            rng: rng_from(seed),
        }
    }

    /// Grid over position and velocity
    pub fn discretizer(&self) -> Result<GridDiscretizer> {
        GridDiscretizer::new(
            vec![18, 14],
            vec![self.config.min_position, -self.config.max_speed],
            vec![self.config.max_position, self.config.max_speed],
        )
    }

    fn observation(&self) -> VectorObservation {
        VectorObservation::new(vec![self.state.position, self.state.velocity])
    }
}

#[async_trait]
impl Environment for MountainCarEnv {
    type Observation = VectorObservation;

    fn name(&self) -> &str {
        "MountainCar"
    }

    fn action_space(&self) -> DiscreteSpace {
        DiscreteSpace::new(3) // 0: push left, 1: no push, 2: push right
    }

    async fn reset(&mut self) -> Result<(Self::Observation, StepInfo)> {
        self.state = MountainCarState {
            position: self.rng.gen_range(-0.6..-0.4),
            velocity: 0.0,
        };
        Ok((self.observation(), StepInfo::default()))
    }

    async fn step(&mut self, action: usize) -> Result<Step<Self::Observation>> {
        self.action_space().check(action)?;
        let c = &self.config;
        let push = action as f64 - 1.0;

        let velocity =
            self.state.velocity + push * c.force - (3.0 * self.state.position).cos() * c.gravity;
        self.state.velocity = velocity.clamp(-c.max_speed, c.max_speed);
        self.state.position =
            (self.state.position + self.state.velocity).clamp(c.min_position, c.max_position);

        // Inelastic left wall
        if self.state.position <= c.min_position && self.state.velocity < 0.0 {
            self.state.velocity = 0.0;
        }

        let done = self.state.position >= c.goal_position;
        Ok(Step {
            observation: self.observation(),
            reward: Reward(-1.0),
            done,
            truncated: false,
            info: StepInfo::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdlab_core::Discretizer;

    #[tokio::test]
    async fn test_cartpole_falls_when_pushed_one_way() {
        let mut env = CartPoleEnv::new(Some(7));
        let (obs, _) = env.reset().await.unwrap();
        assert_eq!(obs.data.len(), 4);
        assert!(obs.data.iter().all(|v| v.abs() <= 0.05));

        let mut steps = 0;
        loop {
            let step = env.step(1).await.unwrap();
            assert_eq!(step.reward.value(), 1.0);
            steps += 1;
            if step.done {
                break;
            }
            assert!(steps < 200, "pole never fell");
        }
        assert!(env.step(1).await.is_err());
        assert_eq!(env.discretizer().unwrap().nb_states(), 324);
    }

    #[tokio::test]
    async fn test_cartpole_seed_is_reproducible() {
        let mut a = CartPoleEnv::new(Some(3));
        let mut b = CartPoleEnv::new(Some(3));
        assert_eq!(a.reset().await.unwrap().0.data, b.reset().await.unwrap().0.data);
    }

    #[tokio::test]
    async fn test_mountain_car_idle_stays_in_bounds() {
        let mut env = MountainCarEnv::new(Some(11));
        let (obs, _) = env.reset().await.unwrap();
        assert!((-0.6..-0.4).contains(&obs.data[0]));
        assert_eq!(obs.data[1], 0.0);

        for _ in 0..300 {
            let step = env.step(1).await.unwrap();
            assert_eq!(step.reward.value(), -1.0);
            assert!(!step.done);
            assert!((-1.2..=0.6).contains(&step.observation.data[0]));
            assert!(step.observation.data[1].abs() <= 0.07);
        }
        assert!(env.step(3).await.is_err());
    }

    #[tokio::test]
    async fn test_mountain_car_swing_reaches_goal() {
        let mut env = MountainCarEnv::new(Some(5));
        env.reset().await.unwrap();
        let mut velocity = 0.0;
        let mut reached = false;
        for _ in 0..500 {
            let action = if velocity < 0.0 { 0 } else { 2 };
            let step = env.step(action).await.unwrap();
            velocity = step.observation.data[1];
            if step.done {
                reached = true;
                break;
            }
        }
        assert!(reached);
    }
}
