//! Game metadata for configuration
//!
//! This module describes the dimensions of a game so the search core,
//! replay buffer and workers can configure themselves per game instead of
//! hard-coding sizes.

use serde::{Deserialize, Serialize};

use crate::environment::ActionId;

/// Metadata about a game
///
/// This struct contains all the information needed to:
/// - Size the network's policy head and the search tree (action_space_size)
/// - Validate observations (observation_shape)
/// - Pick the turn model for backpropagation (player_count)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMetadata {
    /// Environment identifier (e.g., "tictactoe", "poker")
    pub env_id: String,

    /// Human-readable display name (e.g., "Tic-Tac-Toe")
    pub display_name: String,

    /// Number of discrete actions; action ids are `0..action_space_size`
    pub action_space_size: usize,

    /// Shape of every observation this game produces
    pub observation_shape: Vec<usize>,

    /// Number of players (1 for single-player games)
    pub player_count: usize,

    /// Display names for each player
    pub player_names: Vec<String>,

    /// Optional human-readable name per action, indexed by action id
    #[serde(default)]
    pub action_names: Vec<String>,

    /// Brief description of the game rules
    pub description: String,

    /// Whether games are played against a real-world clock
    #[serde(default)]
    pub real_time: bool,
}

impl GameMetadata {
    /// Create a new GameMetadata with required fields
    pub fn new(env_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            env_id: env_id.into(),
            display_name: display_name.into(),
            action_space_size: 0,
            observation_shape: Vec::new(),
            player_count: 2,
            player_names: vec!["Player 1".to_string(), "Player 2".to_string()],
            action_names: Vec::new(),
            description: String::new(),
            real_time: false,
        }
    }

    /// Builder method for action count
    pub fn with_actions(mut self, action_space_size: usize) -> Self {
        self.action_space_size = action_space_size;
        self
    }

    /// Builder method for observation shape
    pub fn with_observation_shape(mut self, shape: Vec<usize>) -> Self {
        self.observation_shape = shape;
        self
    }

    /// Builder method for player information
    pub fn with_players(mut self, count: usize, names: Vec<String>) -> Self {
        self.player_count = count;
        self.player_names = names;
        self
    }

    /// Builder method for action names
    pub fn with_action_names(mut self, names: Vec<String>) -> Self {
        self.action_names = names;
        self
    }

    /// Builder method for description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark the game as played against a real-world clock
    pub fn with_real_time(mut self, real_time: bool) -> Self {
        self.real_time = real_time;
        self
    }

    /// Number of `f32` values in one observation
    pub fn observation_size(&self) -> usize {
        self.observation_shape.iter().product()
    }

    /// Whether `action` is inside the action space
    pub fn contains_action(&self, action: ActionId) -> bool {
        (action as usize) < self.action_space_size
    }

    /// Display name for an action, falling back to its index
    pub fn action_name(&self, action: ActionId) -> String {
        self.action_names
            .get(action as usize)
            .cloned()
            .unwrap_or_else(|| action.to_string())
    }

    /// Whether players alternate turns (two or more players)
    pub fn is_multi_player(&self) -> bool {
        self.player_count > 1
    }
}
