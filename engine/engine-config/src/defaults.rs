//! Default configuration values loaded from config.defaults.toml.
//!
//! This module loads defaults from the shared TOML file at compile time so
//! that every component and the checked-in file agree on one set of values.

use once_cell::sync::Lazy;
use serde::Deserialize;

/// The embedded defaults TOML file (loaded at compile time)
const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

/// Parsed defaults structure (parsed once at first use)
static DEFAULTS: Lazy<DefaultsConfig> = Lazy::new(|| {
    toml::from_str(DEFAULTS_TOML).expect("config.defaults.toml should be valid TOML")
});

// ============================================================================
// Internal structs for parsing config.defaults.toml
// ============================================================================

#[derive(Debug, Deserialize)]
struct DefaultsConfig {
    common: CommonDefaults,
    mcts: MctsDefaults,
    budget: BudgetDefaults,
    replay: ReplayDefaults,
    storage: StorageDefaults,
    actor: ActorDefaults,
    training: TrainingDefaults,
}

#[derive(Debug, Deserialize)]
struct CommonDefaults {
    data_dir: String,
    env_id: String,
    log_level: String,
    seed: u64,
}

#[derive(Debug, Deserialize)]
struct MctsDefaults {
    num_simulations: u32,
    c_puct: f64,
    pb_c_base: f64,
    pb_c_init: f64,
    discount: f64,
    dirichlet_alpha: f64,
    dirichlet_weight: f64,
    temperature: f64,
    temp_threshold: u32,
    late_temperature: f64,
    temperature_decay_steps: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct BudgetDefaults {
    per_simulation_ms: u64,
    safety_margin_ms: u64,
    move_overhead_ms: u64,
    critical_threshold_ms: u64,
    min_simulations: u32,
    estimated_moves: u32,
    cost_ema_alpha: f64,
}

#[derive(Debug, Deserialize)]
struct ReplayDefaults {
    capacity_steps: usize,
    priority: String,
    priority_alpha: f64,
    priority_beta: f64,
    td_steps: usize,
    eviction_window: usize,
    min_fill: usize,
    fill_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct StorageDefaults {
    checkpoint_interval: u64,
    max_checkpoints: usize,
}

#[derive(Debug, Deserialize)]
struct ActorDefaults {
    actor_id: String,
    num_workers: usize,
    max_episodes: i64,
    episode_timeout_secs: u64,
    max_episode_steps: u32,
    max_consecutive_env_failures: u32,
    stats_interval_secs: u64,
    log_interval: u32,
}

#[derive(Debug, Deserialize)]
struct TrainingDefaults {
    batch_size: usize,
    max_steps: u64,
    underfill_backoff_ms: u64,
    max_restarts: u32,
    max_consecutive_failures: u32,
}

// ============================================================================
// Public accessor functions
// ============================================================================

// Common
pub fn data_dir() -> &'static str {
    &DEFAULTS.common.data_dir
}
pub fn env_id() -> &'static str {
    &DEFAULTS.common.env_id
}
pub fn log_level() -> &'static str {
    &DEFAULTS.common.log_level
}
pub fn seed() -> u64 {
    DEFAULTS.common.seed
}

// MCTS
pub fn num_simulations() -> u32 {
    DEFAULTS.mcts.num_simulations
}
pub fn c_puct() -> f64 {
    DEFAULTS.mcts.c_puct
}
pub fn pb_c_base() -> f64 {
    DEFAULTS.mcts.pb_c_base
}
pub fn pb_c_init() -> f64 {
    DEFAULTS.mcts.pb_c_init
}
pub fn discount() -> f64 {
    DEFAULTS.mcts.discount
}
pub fn dirichlet_alpha() -> f64 {
    DEFAULTS.mcts.dirichlet_alpha
}
pub fn dirichlet_weight() -> f64 {
    DEFAULTS.mcts.dirichlet_weight
}
pub fn temperature() -> f64 {
    DEFAULTS.mcts.temperature
}
pub fn temp_threshold() -> u32 {
    DEFAULTS.mcts.temp_threshold
}
pub fn late_temperature() -> f64 {
    DEFAULTS.mcts.late_temperature
}
pub fn temperature_decay_steps() -> &'static [u64] {
    &DEFAULTS.mcts.temperature_decay_steps
}

// Budget
pub fn per_simulation_ms() -> u64 {
    DEFAULTS.budget.per_simulation_ms
}
pub fn safety_margin_ms() -> u64 {
    DEFAULTS.budget.safety_margin_ms
}
pub fn move_overhead_ms() -> u64 {
    DEFAULTS.budget.move_overhead_ms
}
pub fn critical_threshold_ms() -> u64 {
    DEFAULTS.budget.critical_threshold_ms
}
pub fn min_simulations() -> u32 {
    DEFAULTS.budget.min_simulations
}
pub fn estimated_moves() -> u32 {
    DEFAULTS.budget.estimated_moves
}
pub fn cost_ema_alpha() -> f64 {
    DEFAULTS.budget.cost_ema_alpha
}

// Replay
pub fn capacity_steps() -> usize {
    DEFAULTS.replay.capacity_steps
}
pub fn priority() -> &'static str {
    &DEFAULTS.replay.priority
}
pub fn priority_alpha() -> f64 {
    DEFAULTS.replay.priority_alpha
}
pub fn priority_beta() -> f64 {
    DEFAULTS.replay.priority_beta
}
pub fn td_steps() -> usize {
    DEFAULTS.replay.td_steps
}
pub fn eviction_window() -> usize {
    DEFAULTS.replay.eviction_window
}
pub fn min_fill() -> usize {
    DEFAULTS.replay.min_fill
}
pub fn fill_timeout_secs() -> u64 {
    DEFAULTS.replay.fill_timeout_secs
}

// Storage
pub fn checkpoint_interval() -> u64 {
    DEFAULTS.storage.checkpoint_interval
}
pub fn max_checkpoints() -> usize {
    DEFAULTS.storage.max_checkpoints
}

// Actor
pub fn actor_id() -> &'static str {
    &DEFAULTS.actor.actor_id
}
pub fn num_workers() -> usize {
    DEFAULTS.actor.num_workers
}
pub fn max_episodes() -> i64 {
    DEFAULTS.actor.max_episodes
}
pub fn episode_timeout_secs() -> u64 {
    DEFAULTS.actor.episode_timeout_secs
}
pub fn max_episode_steps() -> u32 {
    DEFAULTS.actor.max_episode_steps
}
pub fn max_consecutive_env_failures() -> u32 {
    DEFAULTS.actor.max_consecutive_env_failures
}
pub fn stats_interval_secs() -> u64 {
    DEFAULTS.actor.stats_interval_secs
}
pub fn log_interval() -> u32 {
    DEFAULTS.actor.log_interval
}

// Training
pub fn batch_size() -> usize {
    DEFAULTS.training.batch_size
}
pub fn max_steps() -> u64 {
    DEFAULTS.training.max_steps
}
pub fn underfill_backoff_ms() -> u64 {
    DEFAULTS.training.underfill_backoff_ms
}
pub fn max_restarts() -> u32 {
    DEFAULTS.training.max_restarts
}
pub fn max_consecutive_failures() -> u32 {
    DEFAULTS.training.max_consecutive_failures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        // Just accessing these will verify the TOML parses correctly
        assert_eq!(data_dir(), "./data");
        assert_eq!(env_id(), "tictactoe");
        assert_eq!(log_level(), "info");
    }

    #[test]
    fn test_mcts_defaults() {
        assert_eq!(num_simulations(), 50);
        assert!((c_puct() - 1.25).abs() < f64::EPSILON);
        assert!((discount() - 0.997).abs() < f64::EPSILON);
        assert_eq!(temp_threshold(), 30);
        assert_eq!(temperature_decay_steps(), &[50000, 75000]);
    }

    #[test]
    fn test_budget_defaults() {
        assert_eq!(per_simulation_ms(), 5);
        assert_eq!(safety_margin_ms(), 500);
        assert_eq!(min_simulations(), 4);
        assert!(critical_threshold_ms() > safety_margin_ms());
    }

    #[test]
    fn test_replay_defaults() {
        assert_eq!(capacity_steps(), 100_000);
        assert_eq!(priority(), "value_error");
        assert_eq!(td_steps(), 10);
        assert_eq!(eviction_window(), 1);
    }

    #[test]
    fn test_actor_and_training_defaults() {
        assert_eq!(num_workers(), 2);
        assert_eq!(max_episodes(), -1);
        assert_eq!(batch_size(), 128);
        assert_eq!(max_restarts(), 3);
        assert_eq!(max_consecutive_failures(), 20);
    }
}
