//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable overrides.

use crate::CentralConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",    // Current directory
    "../config.toml", // Parent directory (when running from a crate directory)
];

/// Load the central configuration from config.toml.
///
/// Searches for config.toml in the following order:
/// 1. Path specified by MIRAGE_CONFIG environment variable
/// 2. Current directory (config.toml)
/// 3. Parent directory (../config.toml)
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> CentralConfig {
    if let Ok(path) = std::env::var("MIRAGE_CONFIG") {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("Loading config from MIRAGE_CONFIG: {}", path.display());
            return load_from_path(&path);
        }
        warn!(
            "MIRAGE_CONFIG={} not found, searching defaults",
            path.display()
        );
    }

    for path_str in CONFIG_SEARCH_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(&path);
        }
    }

    debug!("No config.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

/// Load configuration from a specific path.
///
/// Unreadable or unparsable files fall back to the built-in defaults.
pub fn load_from_path(path: &Path) -> CentralConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => apply_env_overrides(config),
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                apply_env_overrides(CentralConfig::default())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (u32, u64, f64, etc.)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        if let Ok(v) =
            std::env::var($key).and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent))
        {
            $config.$section.$field = v;
        }
    };
    // Optional string field
    ($config:expr, $section:ident . $field:ident, $key:expr, optional) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = Some(v);
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: MIRAGE_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.env_id, "MIRAGE_COMMON_ENV_ID");
    env_override!(config, common.data_dir, "MIRAGE_COMMON_DATA_DIR");
    env_override!(config, common.log_level, "MIRAGE_COMMON_LOG_LEVEL");
    env_override!(config, common.seed, "MIRAGE_COMMON_SEED", parse);

    // MCTS
    env_override!(
        config,
        mcts.num_simulations,
        "MIRAGE_MCTS_NUM_SIMULATIONS",
        parse
    );
    env_override!(config, mcts.c_puct, "MIRAGE_MCTS_C_PUCT", parse);
    env_override!(config, mcts.pb_c_base, "MIRAGE_MCTS_PB_C_BASE", parse);
    env_override!(config, mcts.discount, "MIRAGE_MCTS_DISCOUNT", parse);
    env_override!(
        config,
        mcts.dirichlet_alpha,
        "MIRAGE_MCTS_DIRICHLET_ALPHA",
        parse
    );
    env_override!(
        config,
        mcts.dirichlet_weight,
        "MIRAGE_MCTS_DIRICHLET_WEIGHT",
        parse
    );
    env_override!(config, mcts.temperature, "MIRAGE_MCTS_TEMPERATURE", parse);
    env_override!(
        config,
        mcts.temp_threshold,
        "MIRAGE_MCTS_TEMP_THRESHOLD",
        parse
    );

    // Budget
    env_override!(
        config,
        budget.per_simulation_ms,
        "MIRAGE_BUDGET_PER_SIMULATION_MS",
        parse
    );
    env_override!(
        config,
        budget.safety_margin_ms,
        "MIRAGE_BUDGET_SAFETY_MARGIN_MS",
        parse
    );
    env_override!(
        config,
        budget.critical_threshold_ms,
        "MIRAGE_BUDGET_CRITICAL_THRESHOLD_MS",
        parse
    );
    env_override!(
        config,
        budget.min_simulations,
        "MIRAGE_BUDGET_MIN_SIMULATIONS",
        parse
    );

    // Replay
    env_override!(
        config,
        replay.capacity_steps,
        "MIRAGE_REPLAY_CAPACITY_STEPS",
        parse
    );
    env_override!(config, replay.priority, "MIRAGE_REPLAY_PRIORITY");
    env_override!(config, replay.td_steps, "MIRAGE_REPLAY_TD_STEPS", parse);
    env_override!(config, replay.min_fill, "MIRAGE_REPLAY_MIN_FILL", parse);

    // Storage
    env_override!(
        config,
        storage.checkpoint_interval,
        "MIRAGE_STORAGE_CHECKPOINT_INTERVAL",
        parse
    );
    env_override!(
        config,
        storage.max_checkpoints,
        "MIRAGE_STORAGE_MAX_CHECKPOINTS",
        parse
    );
    env_override!(
        config,
        storage.checkpoint_dir,
        "MIRAGE_STORAGE_CHECKPOINT_DIR",
        optional
    );

    // Actor
    env_override!(config, actor.actor_id, "MIRAGE_ACTOR_ACTOR_ID");
    env_override!(
        config,
        actor.num_workers,
        "MIRAGE_ACTOR_NUM_WORKERS",
        parse
    );
    env_override!(
        config,
        actor.max_episodes,
        "MIRAGE_ACTOR_MAX_EPISODES",
        parse
    );
    env_override!(
        config,
        actor.episode_timeout_secs,
        "MIRAGE_ACTOR_EPISODE_TIMEOUT_SECS",
        parse
    );
    env_override!(
        config,
        actor.log_interval,
        "MIRAGE_ACTOR_LOG_INTERVAL",
        parse
    );

    // Training
    env_override!(
        config,
        training.batch_size,
        "MIRAGE_TRAINING_BATCH_SIZE",
        parse
    );
    env_override!(
        config,
        training.max_steps,
        "MIRAGE_TRAINING_MAX_STEPS",
        parse
    );
    env_override!(
        config,
        training.max_restarts,
        "MIRAGE_TRAINING_MAX_RESTARTS",
        parse
    );
    env_override!(
        config,
        training.max_consecutive_failures,
        "MIRAGE_TRAINING_MAX_CONSECUTIVE_FAILURES",
        parse
    );

    config
}
