//! The game environment interface consumed by self-play workers.
//!
//! Environments are stateful: a worker calls `reset`, then alternates
//! `legal_actions`/`to_play` queries with `step` until the step reports
//! `done`. Protocol details of games backed by an external process (e.g. a
//! poker engine over a socket) stay behind this trait.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::metadata::GameMetadata;
use crate::observation::Observation;

/// Discrete action index into a game's action space.
pub type ActionId = u32;

/// Player index. Single-player games always report player 0.
pub type PlayerId = u32;

/// Errors raised by an environment.
///
/// Any of these ends the current game early; the worker records the partial
/// trajectory and moves on to the next game.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvironmentError {
    #[error("Illegal action {action} (legal: {legal:?})")]
    IllegalAction { action: ActionId, legal: Vec<ActionId> },

    #[error("Protocol failure: {0}")]
    Protocol(String),

    #[error("No response from environment within {0:?}")]
    Timeout(Duration),

    #[error("Environment is closed")]
    Closed,

    #[error("Game is already over")]
    GameOver,

    #[error("Environment error: {0}")]
    Other(String),
}

impl EnvironmentError {
    /// Whether this failure came from the opponent/engine not answering in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, EnvironmentError::Timeout(_))
    }
}

/// Result of applying one action.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub observation: Observation,
    /// Reward for the player who took the action.
    pub reward: f32,
    pub done: bool,
}

/// Interface every game exposes to the pipeline.
pub trait Environment: Send + fmt::Debug {
    /// Static description of the game (action-space size, observation shape, players).
    fn metadata(&self) -> GameMetadata;

    /// Start a new game and return the initial observation.
    fn reset(&mut self) -> Result<Observation, EnvironmentError>;

    /// Apply `action` for the player to move.
    fn step(&mut self, action: ActionId) -> Result<Step, EnvironmentError>;

    /// Legal actions in the current state, in ascending order.
    fn legal_actions(&self) -> Vec<ActionId>;

    /// Player to move in the current state.
    fn to_play(&self) -> PlayerId {
        0
    }

    /// Remaining real-world game clock, for games played against a clock.
    fn remaining_clock(&self) -> Option<Duration> {
        None
    }

    /// Action suggested by a built-in expert, for benchmarking only.
    fn expert_action(&mut self) -> Option<ActionId> {
        None
    }

    /// Release any external resources (processes, sockets) tied to the game.
    fn close(&mut self) {}
}
