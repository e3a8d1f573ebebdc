//! Corridor: a deterministic single-player environment.
//!
//! The agent starts at cell 0 of a corridor and must walk to the last cell.
//! Every state offers exactly two actions, back (0) and forward (1); stepping
//! back from cell 0 stays put. Reaching the goal pays +1 and ends the game.
//! A step limit ends games that wander.
//!
//! ```rust
//! use engine_core::Environment;
//! use games_corridor::{Corridor, FORWARD};
//!
//! let mut env = Corridor::new(3);
//! env.reset().unwrap();
//! env.step(FORWARD).unwrap();
//! env.step(FORWARD).unwrap();
//! let last = env.step(FORWARD).unwrap();
//! assert!(last.done);
//! assert_eq!(last.reward, 1.0);
//! ```

use engine_core::{
    register_game, ActionId, Environment, EnvironmentError, GameMetadata, Observation, Step,
};

pub const BACK: ActionId = 0;
pub const FORWARD: ActionId = 1;

pub const DEFAULT_LENGTH: usize = 8;

/// Register Corridor with the global environment registry
pub fn register_corridor() {
    register_game("corridor".to_string(), || Box::new(Corridor::default()));
}

#[derive(Debug, Clone)]
pub struct Corridor {
    length: usize,
    step_limit: u32,
    position: usize,
    steps: u32,
    done: bool,
}

impl Default for Corridor {
    fn default() -> Self {
        Self::new(DEFAULT_LENGTH)
    }
}

impl Corridor {
    /// Corridor whose goal is `length` forward steps from the start.
    /// The step limit defaults to four times the length.
    pub fn new(length: usize) -> Self {
        let length = length.max(1);
        Self {
            length,
            step_limit: (length as u32).saturating_mul(4),
            position: 0,
            steps: 0,
            done: false,
        }
    }

    pub fn with_step_limit(mut self, limit: u32) -> Self {
        self.step_limit = limit.max(1);
        self
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// One-hot position over `length + 1` cells.
    fn observation(&self) -> Observation {
        let mut data = vec![0.0; self.length + 1];
        data[self.position] = 1.0;
        Observation::flat(data)
    }
}

impl Environment for Corridor {
    fn metadata(&self) -> GameMetadata {
        GameMetadata::new("corridor", "Corridor")
            .with_actions(2)
            .with_observation_shape(vec![self.length + 1])
            .with_players(1, vec!["Walker".to_string()])
            .with_action_names(vec!["back".to_string(), "forward".to_string()])
            .with_description("Walk to the end of the corridor")
    }

    fn reset(&mut self) -> Result<Observation, EnvironmentError> {
        self.position = 0;
        self.steps = 0;
        self.done = false;
        Ok(self.observation())
    }

    fn step(&mut self, action: ActionId) -> Result<Step, EnvironmentError> {
        if self.done {
            return Err(EnvironmentError::GameOver);
        }
        match action {
            BACK => self.position = self.position.saturating_sub(1),
            FORWARD => self.position += 1,
            _ => {
                return Err(EnvironmentError::IllegalAction {
                    action,
                    legal: self.legal_actions(),
                })
            }
        }
        self.steps += 1;

        let reached = self.position == self.length;
        self.done = reached || self.steps >= self.step_limit;
        Ok(Step {
            observation: self.observation(),
            reward: if reached { 1.0 } else { 0.0 },
            done: self.done,
        })
    }

    fn legal_actions(&self) -> Vec<ActionId> {
        vec![BACK, FORWARD]
    }

    fn expert_action(&mut self) -> Option<ActionId> {
        (!self.done).then_some(FORWARD)
    }
}
