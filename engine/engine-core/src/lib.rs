//! Core traits and types for the Mirage game environments
//!
//! This crate provides the fundamental abstractions the self-play pipeline
//! consumes from a game:
//! - `Environment`: the narrow interface a self-play worker drives
//!   (reset, step, legal actions, player to move, optional game clock)
//! - `Observation`: a shaped `f32` tensor handed to the representation function
//! - `GameMetadata`: observation shape, action-space size and player count,
//!   used to parameterize the search core per game
//! - `Registry`: static registration of environment factories by `env_id`

pub mod environment;
pub mod metadata;
pub mod observation;
pub mod registry;

// Re-export main types for convenience
pub use environment::{ActionId, Environment, EnvironmentError, PlayerId, Step};
pub use metadata::GameMetadata;
pub use observation::{Observation, ShapeError};
pub use registry::{
    clear_registry, create_environment, is_registered, list_registered_games, register_game,
    EnvironmentFactory,
};
