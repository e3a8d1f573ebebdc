//! Self-play statistics tracking and persistence.
//!
//! Workers update [`ActorStats`] with lock-free atomics after every game.
//! The stats task snapshots it periodically and writes the snapshot to
//! `<data_dir>/actor_stats.json`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

use replay_buffer::TerminationReason;

use crate::worker::GameSummary;

pub const STATS_FILE: &str = "actor_stats.json";

/// Aggregated pipeline statistics, designed for lock-free updates.
#[derive(Debug)]
pub struct ActorStats {
    games_completed: AtomicU64,
    /// Games that ended before their first move and were not stored
    empty_games: AtomicU64,
    total_steps: AtomicU64,
    /// Final reward above, below and at zero
    positive_outcomes: AtomicU64,
    negative_outcomes: AtomicU64,
    neutral_outcomes: AtomicU64,
    normal: AtomicU64,
    forced_done: AtomicU64,
    clock_exhausted: AtomicU64,
    environment_failures: AtomicU64,
    model_failures: AtomicU64,
    budget_exhausted_moves: AtomicU64,
    total_simulations: AtomicU64,
    /// Mirrored from the replay buffer, storage and trainer
    replay_steps: AtomicU64,
    model_version: AtomicU64,
    training_step: AtomicU64,
    start_time: Instant,
    stats_path: PathBuf,
    env_id: String,
}

/// Serializable stats for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorStatsSnapshot {
    pub env_id: String,
    pub games_completed: u64,
    pub empty_games: u64,
    pub total_steps: u64,
    pub positive_outcomes: u64,
    pub negative_outcomes: u64,
    pub neutral_outcomes: u64,
    pub terminations: TerminationCounts,
    pub budget_exhausted_moves: u64,
    pub avg_game_length: f64,
    pub avg_simulations_per_move: f64,
    pub games_per_second: f64,
    pub runtime_seconds: f64,
    pub replay_steps: u64,
    pub model_version: u64,
    pub training_step: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationCounts {
    pub normal: u64,
    pub forced_done: u64,
    pub clock_exhausted: u64,
    pub environment_failure: u64,
    pub model_failure: u64,
}

impl ActorStats {
    pub fn new(data_dir: impl AsRef<Path>, env_id: &str) -> Self {
        let data_dir = data_dir.as_ref();
        if let Err(e) = fs::create_dir_all(data_dir) {
            warn!("Failed to create data directory: {}", e);
        }

        Self {
            games_completed: AtomicU64::new(0),
            empty_games: AtomicU64::new(0),
            total_steps: AtomicU64::new(0),
            positive_outcomes: AtomicU64::new(0),
            negative_outcomes: AtomicU64::new(0),
            neutral_outcomes: AtomicU64::new(0),
            normal: AtomicU64::new(0),
            forced_done: AtomicU64::new(0),
            clock_exhausted: AtomicU64::new(0),
            environment_failures: AtomicU64::new(0),
            model_failures: AtomicU64::new(0),
            budget_exhausted_moves: AtomicU64::new(0),
            total_simulations: AtomicU64::new(0),
            replay_steps: AtomicU64::new(0),
            model_version: AtomicU64::new(0),
            training_step: AtomicU64::new(0),
            start_time: Instant::now(),
            stats_path: data_dir.join(STATS_FILE),
            env_id: env_id.to_string(),
        }
    }

    /// Record a finished game.
    pub fn record_game(&self, summary: &GameSummary) {
        self.games_completed.fetch_add(1, Ordering::Relaxed);
        if summary.steps == 0 {
            self.empty_games.fetch_add(1, Ordering::Relaxed);
        }
        self.total_steps
            .fetch_add(summary.steps as u64, Ordering::Relaxed);
        self.budget_exhausted_moves
            .fetch_add(summary.budget_exhausted_moves as u64, Ordering::Relaxed);
        self.total_simulations
            .fetch_add(summary.simulations, Ordering::Relaxed);

        let outcome = if summary.outcome > 0.0 {
            &self.positive_outcomes
        } else if summary.outcome < 0.0 {
            &self.negative_outcomes
        } else {
            &self.neutral_outcomes
        };
        outcome.fetch_add(1, Ordering::Relaxed);

        let reason = match summary.termination {
            TerminationReason::Normal => &self.normal,
            TerminationReason::ForcedDone => &self.forced_done,
            TerminationReason::ClockExhausted => &self.clock_exhausted,
            TerminationReason::EnvironmentFailure(_) => &self.environment_failures,
            TerminationReason::ModelFailure(_) => &self.model_failures,
        };
        reason.fetch_add(1, Ordering::Relaxed);
    }

    /// Mirror the shared components' counters into the next snapshot.
    pub fn set_pipeline_status(&self, replay_steps: usize, model_version: u64, training_step: u64) {
        self.replay_steps
            .store(replay_steps as u64, Ordering::Relaxed);
        self.model_version.store(model_version, Ordering::Relaxed);
        self.training_step.store(training_step, Ordering::Relaxed);
    }

    pub fn games_completed(&self) -> u64 {
        self.games_completed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ActorStatsSnapshot {
        let games = self.games_completed.load(Ordering::Relaxed);
        let steps = self.total_steps.load(Ordering::Relaxed);
        let simulations = self.total_simulations.load(Ordering::Relaxed);
        let runtime = self.start_time.elapsed().as_secs_f64();

        let avg_game_length = if games > 0 {
            steps as f64 / games as f64
        } else {
            0.0
        };
        let avg_simulations_per_move = if steps > 0 {
            simulations as f64 / steps as f64
        } else {
            0.0
        };
        let games_per_second = if runtime > 0.0 {
            games as f64 / runtime
        } else {
            0.0
        };

        ActorStatsSnapshot {
            env_id: self.env_id.clone(),
            games_completed: games,
            empty_games: self.empty_games.load(Ordering::Relaxed),
            total_steps: steps,
            positive_outcomes: self.positive_outcomes.load(Ordering::Relaxed),
            negative_outcomes: self.negative_outcomes.load(Ordering::Relaxed),
            neutral_outcomes: self.neutral_outcomes.load(Ordering::Relaxed),
            terminations: TerminationCounts {
                normal: self.normal.load(Ordering::Relaxed),
                forced_done: self.forced_done.load(Ordering::Relaxed),
                clock_exhausted: self.clock_exhausted.load(Ordering::Relaxed),
                environment_failure: self.environment_failures.load(Ordering::Relaxed),
                model_failure: self.model_failures.load(Ordering::Relaxed),
            },
            budget_exhausted_moves: self.budget_exhausted_moves.load(Ordering::Relaxed),
            avg_game_length,
            avg_simulations_per_move,
            games_per_second,
            runtime_seconds: runtime,
            replay_steps: self.replay_steps.load(Ordering::Relaxed),
            model_version: self.model_version.load(Ordering::Relaxed),
            training_step: self.training_step.load(Ordering::Relaxed),
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    /// Write stats to JSON file (atomic write-then-rename).
    pub fn write_stats(&self) {
        let snapshot = self.snapshot();

        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(j) => j,
            Err(e) => {
                warn!("Failed to serialize actor stats: {}", e);
                return;
            }
        };

        let temp_path = self.stats_path.with_extension("json.tmp");
        match fs::File::create(&temp_path) {
            Ok(mut file) => {
                if let Err(e) = file.write_all(json.as_bytes()) {
                    warn!("Failed to write actor stats: {}", e);
                    return;
                }
            }
            Err(e) => {
                warn!("Failed to create temp stats file: {}", e);
                return;
            }
        }

        if let Err(e) = fs::rename(&temp_path, &self.stats_path) {
            warn!("Failed to rename stats file: {}", e);
            let _ = fs::remove_file(&temp_path);
            return;
        }

        debug!("Wrote actor stats to {}", self.stats_path.display());
    }

    pub fn stats_path(&self) -> &Path {
        &self.stats_path
    }
}
