//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default values.

use crate::defaults;
use serde::Deserialize;

// ============================================================================
// Serde default functions (required for #[serde(default = "...")])
// These call the accessor functions from defaults module
// ============================================================================

fn d_data_dir() -> String {
    defaults::data_dir().into()
}
fn d_env_id() -> String {
    defaults::env_id().into()
}
fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_seed() -> u64 {
    defaults::seed()
}
fn d_num_sims() -> u32 {
    defaults::num_simulations()
}
fn d_c_puct() -> f64 {
    defaults::c_puct()
}
fn d_pb_c_base() -> f64 {
    defaults::pb_c_base()
}
fn d_pb_c_init() -> f64 {
    defaults::pb_c_init()
}
fn d_discount() -> f64 {
    defaults::discount()
}
fn d_dirichlet_alpha() -> f64 {
    defaults::dirichlet_alpha()
}
fn d_dirichlet_weight() -> f64 {
    defaults::dirichlet_weight()
}
fn d_temperature() -> f64 {
    defaults::temperature()
}
fn d_temp_threshold() -> u32 {
    defaults::temp_threshold()
}
fn d_late_temperature() -> f64 {
    defaults::late_temperature()
}
fn d_temperature_decay_steps() -> Vec<u64> {
    defaults::temperature_decay_steps().to_vec()
}
fn d_per_sim_ms() -> u64 {
    defaults::per_simulation_ms()
}
fn d_safety_margin_ms() -> u64 {
    defaults::safety_margin_ms()
}
fn d_move_overhead_ms() -> u64 {
    defaults::move_overhead_ms()
}
fn d_critical_ms() -> u64 {
    defaults::critical_threshold_ms()
}
fn d_min_sims() -> u32 {
    defaults::min_simulations()
}
fn d_estimated_moves() -> u32 {
    defaults::estimated_moves()
}
fn d_cost_ema_alpha() -> f64 {
    defaults::cost_ema_alpha()
}
fn d_capacity_steps() -> usize {
    defaults::capacity_steps()
}
fn d_priority() -> String {
    defaults::priority().into()
}
fn d_priority_alpha() -> f64 {
    defaults::priority_alpha()
}
fn d_priority_beta() -> f64 {
    defaults::priority_beta()
}
fn d_td_steps() -> usize {
    defaults::td_steps()
}
fn d_eviction_window() -> usize {
    defaults::eviction_window()
}
fn d_min_fill() -> usize {
    defaults::min_fill()
}
fn d_fill_timeout() -> u64 {
    defaults::fill_timeout_secs()
}
fn d_ckpt_interval() -> u64 {
    defaults::checkpoint_interval()
}
fn d_max_ckpts() -> usize {
    defaults::max_checkpoints()
}
fn d_actor_id() -> String {
    defaults::actor_id().into()
}
fn d_num_workers() -> usize {
    defaults::num_workers()
}
fn d_max_episodes() -> i64 {
    defaults::max_episodes()
}
fn d_episode_timeout() -> u64 {
    defaults::episode_timeout_secs()
}
fn d_max_episode_steps() -> u32 {
    defaults::max_episode_steps()
}
fn d_max_env_failures() -> u32 {
    defaults::max_consecutive_env_failures()
}
fn d_stats_interval() -> u64 {
    defaults::stats_interval_secs()
}
fn d_log_interval() -> u32 {
    defaults::log_interval()
}
fn d_batch_size() -> usize {
    defaults::batch_size()
}
fn d_max_steps() -> u64 {
    defaults::max_steps()
}
fn d_underfill_backoff() -> u64 {
    defaults::underfill_backoff_ms()
}
fn d_max_restarts() -> u32 {
    defaults::max_restarts()
}
fn d_max_consecutive_failures() -> u32 {
    defaults::max_consecutive_failures()
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub mcts: MctsConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub actor: ActorConfig,
    #[serde(default)]
    pub training: TrainingConfig,
}

/// Common configuration shared by all components
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(default = "d_data_dir")]
    pub data_dir: String,
    #[serde(default = "d_env_id")]
    pub env_id: String,
    #[serde(default = "d_log_level")]
    pub log_level: String,
    /// Base RNG seed; 0 seeds from entropy
    #[serde(default = "d_seed")]
    pub seed: u64,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir().into(),
            env_id: defaults::env_id().into(),
            log_level: defaults::log_level().into(),
            seed: defaults::seed(),
        }
    }
}

/// MCTS (Monte Carlo Tree Search) configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MctsConfig {
    #[serde(default = "d_num_sims")]
    pub num_simulations: u32,
    #[serde(default = "d_c_puct")]
    pub c_puct: f64,
    /// 0 disables the log-growth exploration term
    #[serde(default = "d_pb_c_base")]
    pub pb_c_base: f64,
    #[serde(default = "d_pb_c_init")]
    pub pb_c_init: f64,
    #[serde(default = "d_discount")]
    pub discount: f64,
    #[serde(default = "d_dirichlet_alpha")]
    pub dirichlet_alpha: f64,
    #[serde(default = "d_dirichlet_weight")]
    pub dirichlet_weight: f64,
    #[serde(default = "d_temperature")]
    pub temperature: f64,
    /// Move number after which `late_temperature` applies
    #[serde(default = "d_temp_threshold")]
    pub temp_threshold: u32,
    #[serde(default = "d_late_temperature")]
    pub late_temperature: f64,
    #[serde(default = "d_temperature_decay_steps")]
    pub temperature_decay_steps: Vec<u64>,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            num_simulations: defaults::num_simulations(),
            c_puct: defaults::c_puct(),
            pb_c_base: defaults::pb_c_base(),
            pb_c_init: defaults::pb_c_init(),
            discount: defaults::discount(),
            dirichlet_alpha: defaults::dirichlet_alpha(),
            dirichlet_weight: defaults::dirichlet_weight(),
            temperature: defaults::temperature(),
            temp_threshold: defaults::temp_threshold(),
            late_temperature: defaults::late_temperature(),
            temperature_decay_steps: defaults::temperature_decay_steps().to_vec(),
        }
    }
}

/// Time budget configuration for real-clock games
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BudgetConfig {
    #[serde(default = "d_per_sim_ms")]
    pub per_simulation_ms: u64,
    #[serde(default = "d_safety_margin_ms")]
    pub safety_margin_ms: u64,
    #[serde(default = "d_move_overhead_ms")]
    pub move_overhead_ms: u64,
    #[serde(default = "d_critical_ms")]
    pub critical_threshold_ms: u64,
    #[serde(default = "d_min_sims")]
    pub min_simulations: u32,
    #[serde(default = "d_estimated_moves")]
    pub estimated_moves: u32,
    #[serde(default = "d_cost_ema_alpha")]
    pub cost_ema_alpha: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            per_simulation_ms: defaults::per_simulation_ms(),
            safety_margin_ms: defaults::safety_margin_ms(),
            move_overhead_ms: defaults::move_overhead_ms(),
            critical_threshold_ms: defaults::critical_threshold_ms(),
            min_simulations: defaults::min_simulations(),
            estimated_moves: defaults::estimated_moves(),
            cost_ema_alpha: defaults::cost_ema_alpha(),
        }
    }
}

/// Replay buffer configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReplayConfig {
    /// Capacity measured in stored steps
    #[serde(default = "d_capacity_steps")]
    pub capacity_steps: usize,
    /// "uniform", "value_error" or "recency"
    #[serde(default = "d_priority")]
    pub priority: String,
    #[serde(default = "d_priority_alpha")]
    pub priority_alpha: f64,
    #[serde(default = "d_priority_beta")]
    pub priority_beta: f64,
    #[serde(default = "d_td_steps")]
    pub td_steps: usize,
    #[serde(default = "d_eviction_window")]
    pub eviction_window: usize,
    #[serde(default = "d_min_fill")]
    pub min_fill: usize,
    #[serde(default = "d_fill_timeout")]
    pub fill_timeout_secs: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            capacity_steps: defaults::capacity_steps(),
            priority: defaults::priority().into(),
            priority_alpha: defaults::priority_alpha(),
            priority_beta: defaults::priority_beta(),
            td_steps: defaults::td_steps(),
            eviction_window: defaults::eviction_window(),
            min_fill: defaults::min_fill(),
            fill_timeout_secs: defaults::fill_timeout_secs(),
        }
    }
}

/// Model storage and checkpoint configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Checkpoint every N published versions (0 disables checkpoints)
    #[serde(default = "d_ckpt_interval")]
    pub checkpoint_interval: u64,
    #[serde(default = "d_max_ckpts")]
    pub max_checkpoints: usize,
    /// Checkpoint directory; defaults to `<data_dir>/checkpoints`
    #[serde(default)]
    pub checkpoint_dir: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: defaults::checkpoint_interval(),
            max_checkpoints: defaults::max_checkpoints(),
            checkpoint_dir: None,
        }
    }
}

/// Actor (self-play) configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ActorConfig {
    #[serde(default = "d_actor_id")]
    pub actor_id: String,
    #[serde(default = "d_num_workers")]
    pub num_workers: usize,
    #[serde(default = "d_max_episodes")]
    pub max_episodes: i64,
    #[serde(default = "d_episode_timeout")]
    pub episode_timeout_secs: u64,
    #[serde(default = "d_max_episode_steps")]
    pub max_episode_steps: u32,
    #[serde(default = "d_max_env_failures")]
    pub max_consecutive_env_failures: u32,
    #[serde(default = "d_stats_interval")]
    pub stats_interval_secs: u64,
    #[serde(default = "d_log_interval")]
    pub log_interval: u32,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            actor_id: defaults::actor_id().into(),
            num_workers: defaults::num_workers(),
            max_episodes: defaults::max_episodes(),
            episode_timeout_secs: defaults::episode_timeout_secs(),
            max_episode_steps: defaults::max_episode_steps(),
            max_consecutive_env_failures: defaults::max_consecutive_env_failures(),
            stats_interval_secs: defaults::stats_interval_secs(),
            log_interval: defaults::log_interval(),
        }
    }
}

/// Training configuration for the trainer
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrainingConfig {
    #[serde(default = "d_batch_size")]
    pub batch_size: usize,
    /// Stop after this many steps (0 = run until shutdown)
    #[serde(default = "d_max_steps")]
    pub max_steps: u64,
    #[serde(default = "d_underfill_backoff")]
    pub underfill_backoff_ms: u64,
    #[serde(default = "d_max_restarts")]
    pub max_restarts: u32,
    /// Failed steps in a row before the trainer gives up (0 = never)
    #[serde(default = "d_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::batch_size(),
            max_steps: defaults::max_steps(),
            underfill_backoff_ms: defaults::underfill_backoff_ms(),
            max_restarts: defaults::max_restarts(),
            max_consecutive_failures: defaults::max_consecutive_failures(),
        }
    }
}
