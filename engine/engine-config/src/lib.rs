//! Centralized configuration loading from config.toml.
//!
//! This crate provides configuration structs and loading logic shared
//! across all Mirage components (actor workers, trainer, storage).
//!
//! # Configuration Priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`MIRAGE_<SECTION>_<KEY>`)
//! 2. config.toml file
//! 3. Built-in defaults
//!
//! # Environment Variable Override Pattern
//!
//! ```text
//! MIRAGE_<SECTION>_<KEY>=value
//!
//! Examples:
//!     MIRAGE_COMMON_ENV_ID=corridor
//!     MIRAGE_COMMON_DATA_DIR=/data
//!     MIRAGE_MCTS_NUM_SIMULATIONS=100
//!     MIRAGE_REPLAY_CAPACITY_STEPS=50000
//!     MIRAGE_BUDGET_SAFETY_MARGIN_MS=250
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{apply_env_overrides, load_config, load_from_path, CONFIG_SEARCH_PATHS};
pub use structs::*;
