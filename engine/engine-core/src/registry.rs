//! Static environment registry
//!
//! This module provides a thread-safe registry that maps an `env_id` to a
//! factory function, so workers can build fresh environments by name at
//! runtime.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use crate::environment::Environment;

/// Factory function type for creating environment instances
pub type EnvironmentFactory = fn() -> Box<dyn Environment>;

/// Thread-safe registry mapping env_id to environment factory functions
static REGISTRY: Lazy<Mutex<HashMap<String, EnvironmentFactory>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

// A panic while holding the lock cannot leave the map half-written, so a
// poisoned registry is still usable.
fn registry() -> MutexGuard<'static, HashMap<String, EnvironmentFactory>> {
    REGISTRY.lock().unwrap_or_else(|e| e.into_inner())
}

/// Register an environment factory with the global registry
///
/// Registering the same `env_id` twice replaces the earlier factory.
///
/// # Example
///
/// ```rust
/// # use engine_core::*;
/// # #[derive(Debug)]
/// # struct Solo;
/// # impl Environment for Solo {
/// #     fn metadata(&self) -> GameMetadata { GameMetadata::new("solo", "Solo") }
/// #     fn reset(&mut self) -> Result<Observation, EnvironmentError> {
/// #         Ok(Observation::flat(vec![0.0]))
/// #     }
/// #     fn step(&mut self, _a: ActionId) -> Result<Step, EnvironmentError> {
/// #         Ok(Step { observation: Observation::flat(vec![0.0]), reward: 0.0, done: true })
/// #     }
/// #     fn legal_actions(&self) -> Vec<ActionId> { vec![0] }
/// # }
/// fn solo_factory() -> Box<dyn Environment> {
///     Box::new(Solo)
/// }
///
/// register_game("solo".to_string(), solo_factory);
/// assert!(is_registered("solo"));
/// ```
pub fn register_game(env_id: String, factory: EnvironmentFactory) {
    let mut registry = registry();
    if registry.contains_key(&env_id) {
        warn!(env_id = %env_id, "Overriding existing game registration");
    }
    registry.insert(env_id, factory);
}

/// Create a new environment instance by env_id
///
/// Returns `None` if nothing is registered under `env_id`.
pub fn create_environment(env_id: &str) -> Option<Box<dyn Environment>> {
    let factory = registry().get(env_id).copied();
    match factory {
        Some(factory) => Some(factory()),
        None => {
            warn!(env_id = %env_id, "Attempted to create unregistered game");
            None
        }
    }
}

/// Get list of all registered environment IDs, sorted
pub fn list_registered_games() -> Vec<String> {
    let mut games: Vec<String> = registry().keys().cloned().collect();
    games.sort();
    games
}

/// Check if a game is registered
pub fn is_registered(env_id: &str) -> bool {
    registry().contains_key(env_id)
}

/// Clear all registered games (mainly for testing)
pub fn clear_registry() {
    registry().clear();
}
