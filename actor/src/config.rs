//! Configuration for the actor binary
//!
//! Defaults come from the central config (config.defaults.toml, config.toml
//! and MIRAGE_<SECTION>_<KEY> env vars). CLI arguments take highest priority.
//! The remaining central sections ride along and are converted into the
//! per-crate runtime configs here.

use anyhow::{anyhow, Result};
use clap::Parser;
use engine_config::{load_config, CentralConfig};
use once_cell::sync::Lazy;
use replay_buffer::{PriorityMode, ReplayConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use trainer::TrainerConfig;

use crate::temperature::TemperatureSchedule;
use crate::worker::WorkerConfig;

// Load central config once at startup
static CENTRAL_CONFIG: Lazy<CentralConfig> = Lazy::new(load_config);

#[derive(Parser, Debug, Clone)]
#[command(name = "actor")]
#[command(about = "Mirage self-play pipeline: workers, replay buffer and trainer")]
#[command(
    long_about = "Runs N self-play workers and one trainer in a single process. Workers
search with MCTS over the latest published model and push finished games into a
shared replay buffer; the trainer samples from it and publishes new versions.

Configuration is loaded from config.toml with MIRAGE_<SECTION>_<KEY> environment
variable overrides. CLI arguments take highest priority."
)]
pub struct Config {
    /// Unique actor identifier
    #[arg(long, default_value_t = CENTRAL_CONFIG.actor.actor_id.clone())]
    pub actor_id: String,

    /// Environment ID to run (e.g., tictactoe, corridor)
    #[arg(long, default_value_t = CENTRAL_CONFIG.common.env_id.clone())]
    pub env_id: String,

    /// Number of parallel self-play workers
    #[arg(long, default_value_t = CENTRAL_CONFIG.actor.num_workers)]
    pub num_workers: usize,

    /// Maximum games across all workers (-1 for unlimited)
    #[arg(long, default_value_t = CENTRAL_CONFIG.actor.max_episodes)]
    pub max_episodes: i64,

    /// Wall-clock limit per game in seconds
    #[arg(long, default_value_t = CENTRAL_CONFIG.actor.episode_timeout_secs)]
    pub episode_timeout_secs: u64,

    /// Move limit per game (0 to disable)
    #[arg(long, default_value_t = CENTRAL_CONFIG.actor.max_episode_steps)]
    pub max_episode_steps: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = CENTRAL_CONFIG.common.log_level.clone())]
    pub log_level: String,

    /// Log progress every N games per worker (0 to disable)
    #[arg(long, default_value_t = CENTRAL_CONFIG.actor.log_interval)]
    pub log_interval: u32,

    /// Data directory for stats and checkpoints
    #[arg(long, default_value_t = CENTRAL_CONFIG.common.data_dir.clone())]
    pub data_dir: String,

    /// Number of MCTS simulations per move when no clock applies
    #[arg(long, default_value_t = CENTRAL_CONFIG.mcts.num_simulations)]
    pub num_simulations: u32,

    /// Move number after which the late temperature applies (0 to disable)
    #[arg(long, default_value_t = CENTRAL_CONFIG.mcts.temp_threshold)]
    pub temp_threshold: u32,

    /// RNG seed (0 for entropy)
    #[arg(long, default_value_t = CENTRAL_CONFIG.common.seed)]
    pub seed: u64,

    /// Steps per training batch
    #[arg(long, default_value_t = CENTRAL_CONFIG.training.batch_size)]
    pub batch_size: usize,

    /// Stop training after this many steps (0 for unlimited)
    #[arg(long, default_value_t = CENTRAL_CONFIG.training.max_steps)]
    pub max_train_steps: u64,

    /// Interval between stats file writes in seconds
    #[arg(long, default_value_t = CENTRAL_CONFIG.actor.stats_interval_secs)]
    pub stats_interval_secs: u64,

    /// Checkpoint every N training steps (0 to disable)
    #[arg(long, default_value_t = CENTRAL_CONFIG.storage.checkpoint_interval)]
    pub checkpoint_interval: u64,

    /// Sections with no CLI flag
    #[arg(skip = CENTRAL_CONFIG.clone())]
    pub central: CentralConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.actor_id.is_empty() {
            return Err(anyhow!("actor_id cannot be empty"));
        }

        if self.env_id.is_empty() {
            return Err(anyhow!("env_id cannot be empty"));
        }

        if self.num_workers == 0 {
            return Err(anyhow!("num_workers must be greater than 0"));
        }

        if self.episode_timeout_secs == 0 {
            return Err(anyhow!("episode_timeout_secs must be greater than 0"));
        }

        if self.stats_interval_secs == 0 {
            return Err(anyhow!("stats_interval_secs must be greater than 0"));
        }

        if self.num_simulations == 0 {
            return Err(anyhow!("num_simulations must be greater than 0"));
        }

        if self.batch_size == 0 {
            return Err(anyhow!("batch_size must be greater than 0"));
        }

        if self.central.replay.capacity_steps < self.batch_size {
            return Err(anyhow!(
                "replay capacity_steps ({}) must be at least batch_size ({})",
                self.central.replay.capacity_steps,
                self.batch_size
            ));
        }

        self.priority_mode()?;

        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }

        Ok(())
    }

    pub fn episode_timeout(&self) -> Duration {
        Duration::from_secs(self.episode_timeout_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    /// Game limit across all workers, `None` for unlimited.
    pub fn max_games(&self) -> Option<u64> {
        u64::try_from(self.max_episodes).ok()
    }

    pub fn max_trainer_restarts(&self) -> u32 {
        self.central.training.max_restarts
    }

    /// Checkpoint directory, defaulting to `<data_dir>/checkpoints`
    pub fn checkpoint_dir(&self) -> PathBuf {
        match &self.central.storage.checkpoint_dir {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from(&self.data_dir).join("checkpoints"),
        }
    }

    fn priority_mode(&self) -> Result<PriorityMode> {
        self.central
            .replay
            .priority
            .parse()
            .map_err(|e: String| anyhow!(e))
    }

    pub fn mcts_config(&self) -> mcts::MctsConfig {
        let central = &self.central.mcts;
        mcts::MctsConfig {
            num_simulations: self.num_simulations,
            c_puct: central.c_puct as f32,
            pb_c_base: central.pb_c_base as f32,
            pb_c_init: central.pb_c_init as f32,
            discount: central.discount as f32,
            dirichlet_alpha: central.dirichlet_alpha as f32,
            dirichlet_epsilon: central.dirichlet_weight as f32,
            ..mcts::MctsConfig::default()
        }
    }

    pub fn budget_config(&self) -> mcts::BudgetConfig {
        let central = &self.central.budget;
        mcts::BudgetConfig {
            per_simulation_cost: Duration::from_millis(central.per_simulation_ms),
            safety_margin: Duration::from_millis(central.safety_margin_ms),
            move_overhead: Duration::from_millis(central.move_overhead_ms),
            critical_threshold: Duration::from_millis(central.critical_threshold_ms),
            min_simulations: central.min_simulations,
            cost_ema_alpha: central.cost_ema_alpha,
        }
    }

    /// Replay settings. The n-step discount follows the search discount.
    pub fn replay_config(&self) -> Result<ReplayConfig> {
        let central = &self.central.replay;
        Ok(ReplayConfig::default()
            .with_capacity(central.capacity_steps)
            .with_priority(
                self.priority_mode()?,
                central.priority_alpha as f32,
                central.priority_beta as f32,
            )
            .with_td_steps(central.td_steps, self.central.mcts.discount as f32)
            .with_eviction_window(central.eviction_window))
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            batch_size: self.batch_size,
            max_steps: self.max_train_steps,
            min_fill: self.central.replay.min_fill,
            fill_timeout: Duration::from_secs(self.central.replay.fill_timeout_secs),
            underfill_backoff: Duration::from_millis(self.central.training.underfill_backoff_ms),
            failure_backoff: Duration::from_millis(self.central.training.underfill_backoff_ms),
            max_consecutive_failures: self.central.training.max_consecutive_failures,
            checkpoint_interval: self.checkpoint_interval,
            log_interval: self.log_interval as u64,
            seed: self.seed,
        }
    }

    pub fn worker_config(&self, worker_id: usize) -> WorkerConfig {
        WorkerConfig {
            worker_id,
            actor_id: self.actor_id.clone(),
            episode_timeout: self.episode_timeout(),
            max_episode_steps: self.max_episode_steps,
            max_consecutive_env_failures: self.central.actor.max_consecutive_env_failures,
            estimated_moves: self.central.budget.estimated_moves,
            log_interval: self.log_interval,
            seed: self.seed,
        }
    }

    pub fn temperature_schedule(&self) -> TemperatureSchedule {
        let late = self.central.mcts.late_temperature as f32;
        TemperatureSchedule::from(&self.central.mcts).with_move_threshold(self.temp_threshold, late)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            actor_id: "actor".into(),
            env_id: "tictactoe".into(),
            num_workers: 2,
            max_episodes: 10,
            episode_timeout_secs: 30,
            max_episode_steps: 100,
            log_level: "info".into(),
            log_interval: 10,
            data_dir: "../data".into(),
            num_simulations: 100,
            temp_threshold: 0,
            seed: 7,
            batch_size: 32,
            max_train_steps: 0,
            stats_interval_secs: 5,
            checkpoint_interval: 100,
            central: CentralConfig::default(),
        }
    }

    #[test]
    fn validate_accepts_valid_configuration() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_actor_id() {
        let mut cfg = base_config();
        cfg.actor_id.clear();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("actor_id"));
    }

    #[test]
    fn validate_rejects_empty_env_id() {
        let mut cfg = base_config();
        cfg.env_id.clear();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("env_id"));
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut cfg = base_config();
        cfg.num_workers = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("num_workers"));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut cfg = base_config();
        cfg.log_level = "nope".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("invalid log level"));
    }

    #[test]
    fn validate_rejects_zero_episode_timeout() {
        let mut cfg = base_config();
        cfg.episode_timeout_secs = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("episode_timeout_secs"));
    }

    #[test]
    fn validate_rejects_unknown_priority_mode() {
        let mut cfg = base_config();
        cfg.central.replay.priority = "loudest".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("loudest"));
    }

    #[test]
    fn validate_rejects_batch_larger_than_capacity() {
        let mut cfg = base_config();
        cfg.central.replay.capacity_steps = 16;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("capacity_steps"));
    }

    #[test]
    fn negative_max_episodes_means_unlimited() {
        let mut cfg = base_config();
        cfg.max_episodes = -1;
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_games(), None);
        cfg.max_episodes = 3;
        assert_eq!(cfg.max_games(), Some(3));
    }

    #[test]
    fn checkpoint_dir_defaults_under_data_dir() {
        let mut cfg = base_config();
        assert_eq!(cfg.checkpoint_dir(), PathBuf::from("../data/checkpoints"));
        cfg.central.storage.checkpoint_dir = Some("/tmp/ckpt".into());
        assert_eq!(cfg.checkpoint_dir(), PathBuf::from("/tmp/ckpt"));
    }

    #[test]
    fn runtime_configs_follow_cli_and_central() {
        let cfg = base_config();

        let mcts = cfg.mcts_config();
        assert_eq!(mcts.num_simulations, 100);
        assert!((mcts.discount - cfg.central.mcts.discount as f32).abs() < 1e-6);

        let budget = cfg.budget_config();
        assert_eq!(
            budget.safety_margin,
            Duration::from_millis(cfg.central.budget.safety_margin_ms)
        );

        let replay = cfg.replay_config().unwrap();
        assert_eq!(replay.capacity_steps, cfg.central.replay.capacity_steps);

        let trainer = cfg.trainer_config();
        assert_eq!(trainer.batch_size, 32);
        assert_eq!(trainer.checkpoint_interval, 100);
        assert_eq!(
            trainer.max_consecutive_failures,
            cfg.central.training.max_consecutive_failures
        );

        let worker = cfg.worker_config(3);
        assert_eq!(worker.worker_id, 3);
        assert_eq!(worker.episode_timeout, Duration::from_secs(30));
        assert_eq!(worker.seed, 7);
    }

    #[test]
    fn temp_threshold_flag_overrides_central() {
        let mut cfg = base_config();
        cfg.temp_threshold = 5;
        let schedule = cfg.temperature_schedule();
        assert_eq!(schedule.move_threshold, 5);
    }
}
