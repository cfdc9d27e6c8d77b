//! Small discrete environments whose observations are state indices

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tdlab_core::{
    DiscreteSpace, Environment, IndexDiscretizer, RLError, Result, Reward, Step, StepInfo,
    VectorObservation,
};

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Corridor with a terminal cell at each end.
///
/// The agent starts in the middle and moves left (0) or right (1); with
/// probability `slip` it moves the other way instead. Reaching the right end
/// pays +1, the left end pays 0.
pub struct RandomWalk {
    nb_states: usize,
    slip: f64,
    position: usize,
    rng: StdRng,
}

impl RandomWalk {
    /// Corridor of `nb_states` cells, the two ends included
    pub fn new(nb_states: usize, slip: f64, seed: Option<u64>) -> Result<Self> {
        if nb_states < 3 {
            return Err(RLError::config("a random walk needs at least 3 cells"));
        }
        if !(0.0..=1.0).contains(&slip) {
            return Err(RLError::config(format!("slip must lie in [0, 1], got {slip}")));
        }
        Ok(Self {
            nb_states,
            slip,
            position: nb_states / 2,
            rng: rng_from(seed),
        })
    }

    /// Discretizer matching the observations
    #[must_use]
    pub fn discretizer(&self) -> IndexDiscretizer {
        IndexDiscretizer::new(self.nb_states)
    }
}

#[async_trait]
impl Environment for RandomWalk {
    type Observation = VectorObservation;

    fn name(&self) -> &str {
        "RandomWalk"
    }

    fn action_space(&self) -> DiscreteSpace {
        DiscreteSpace::new(2)
    }

    async fn reset(&mut self) -> Result<(Self::Observation, StepInfo)> {
        self.position = self.nb_states / 2;
        Ok((VectorObservation::index(self.position), StepInfo::default()))
    }

    async fn step(&mut self, action: usize) -> Result<Step<Self::Observation>> {
        self.action_space().check(action)?;
        if self.position == 0 || self.position == self.nb_states - 1 {
            return Err(RLError::Environment("step after the episode ended".into()));
        }

        let slipped = self.rng.gen::<f64>() < self.slip;
        let right = (action == 1) != slipped;
        self.position = if right { self.position + 1 } else { self.position - 1 };

        let done = self.position == 0 || self.position == self.nb_states - 1;
        let reward = if self.position == self.nb_states - 1 { 1.0 } else { 0.0 };
        Ok(Step {
            observation: VectorObservation::index(self.position),
            reward: Reward(reward),
            done,
            truncated: false,
            info: StepInfo::with("slipped", slipped),
        })
    }
}

const CLIFF_ROWS: usize = 4;
const CLIFF_COLS: usize = 12;

/// The 4x12 cliff-walking grid.
///
/// Actions are up (0), right (1), down (2) and left (3). Every move costs 1;
/// stepping into the cliff along the bottom row costs 100 and sends the agent
/// back to the start. The episode ends at the bottom-right goal.
pub struct CliffWalking {
    position: (usize, usize),
}

impl CliffWalking {
    const START: (usize, usize) = (CLIFF_ROWS - 1, 0);
    const GOAL: (usize, usize) = (CLIFF_ROWS - 1, CLIFF_COLS - 1);

    /// Agent at the start cell
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Self::START,
        }
    }

    /// Discretizer matching the observations
    #[must_use]
    pub fn discretizer(&self) -> IndexDiscretizer {
        IndexDiscretizer::new(CLIFF_ROWS * CLIFF_COLS)
    }

    fn observation(&self) -> VectorObservation {
        VectorObservation::index(self.position.0 * CLIFF_COLS + self.position.1)
    }

    fn is_cliff((row, col): (usize, usize)) -> bool {
        row == CLIFF_ROWS - 1 && col > 0 && col < CLIFF_COLS - 1
    }
}

impl Default for CliffWalking {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Environment for CliffWalking {
    type Observation = VectorObservation;

    fn name(&self) -> &str {
        "CliffWalking"
    }

    fn action_space(&self) -> DiscreteSpace {
        DiscreteSpace::new(4)
    }

    async fn reset(&mut self) -> Result<(Self::Observation, StepInfo)> {
        self.position = Self::START;
        Ok((self.observation(), StepInfo::default()))
    }

    async fn step(&mut self, action: usize) -> Result<Step<Self::Observation>> {
        self.action_space().check(action)?;
        let (row, col) = self.position;
        let target = match action {
            0 => (row.saturating_sub(1), col),
            1 => (row, (col + 1).min(CLIFF_COLS - 1)),
            2 => ((row + 1).min(CLIFF_ROWS - 1), col),
            _ => (row, col.saturating_sub(1)),
        };

        let fell = Self::is_cliff(target);
        self.position = if fell { Self::START } else { target };
        Ok(Step {
            observation: self.observation(),
            reward: Reward(if fell { -100.0 } else { -1.0 }),
            done: self.position == Self::GOAL,
            truncated: false,
            info: StepInfo::with("fell", fell),
        })
    }
}
