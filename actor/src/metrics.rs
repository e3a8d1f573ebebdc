//! Prometheus metrics for the self-play pipeline.
//!
//! Counters cover games, moves and search effort on the worker side, plus
//! gauges mirrored from the replay buffer, shared storage and trainer by the
//! periodic stats task.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Once;
use std::time::Duration;
use tracing::warn;

use crate::worker::GameSummary;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ========== Game Counters ==========

    /// Total number of self-play games finished
    pub static ref GAMES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("mirage_games_total", "Total number of self-play games finished")
    ).unwrap();

    /// Games by termination reason
    pub static ref GAME_TERMINATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("mirage_game_terminations_total", "Self-play games by termination reason"),
        &["reason"]
    ).unwrap();

    /// Partial games with no steps, which are never stored
    pub static ref EMPTY_GAMES: IntCounter = IntCounter::with_opts(
        Opts::new("mirage_empty_games_total", "Games that ended before their first move")
    ).unwrap();

    // ========== Game Histograms ==========

    pub static ref GAME_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("mirage_game_duration_seconds", "Time to play one game")
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0])
    ).unwrap();

    pub static ref GAME_STEPS: Histogram = Histogram::with_opts(
        HistogramOpts::new("mirage_game_steps", "Moves per game")
            .buckets(vec![5.0, 10.0, 20.0, 30.0, 50.0, 100.0, 200.0, 500.0])
    ).unwrap();

    // ========== Search Metrics ==========

    /// Total moves searched
    pub static ref MOVES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("mirage_moves_total", "Total moves chosen by search")
    ).unwrap();

    /// Moves whose search was cut short by the time budget
    pub static ref BUDGET_EXHAUSTED_MOVES: IntCounter = IntCounter::with_opts(
        Opts::new("mirage_budget_exhausted_moves_total", "Moves whose search the time budget cut short")
    ).unwrap();

    pub static ref SIMULATIONS_PER_SEARCH: Histogram = Histogram::with_opts(
        HistogramOpts::new("mirage_simulations_per_search", "Simulations completed per search")
            .buckets(vec![1.0, 4.0, 10.0, 25.0, 50.0, 100.0, 200.0, 400.0, 800.0])
    ).unwrap();

    pub static ref SEARCH_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("mirage_search_seconds", "Wall time per search")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0])
    ).unwrap();

    // ========== Model Metrics ==========

    pub static ref MODEL_RELOADS: IntCounter = IntCounter::with_opts(
        Opts::new("mirage_model_reloads_total", "Times a worker rebuilt its network for a new version")
    ).unwrap();

    pub static ref MODEL_VERSION: IntGauge = IntGauge::with_opts(
        Opts::new("mirage_model_version", "Latest published model version")
    ).unwrap();

    // ========== Replay and Trainer Gauges ==========

    pub static ref REPLAY_STEPS: IntGauge = IntGauge::with_opts(
        Opts::new("mirage_replay_steps", "Steps stored in the replay buffer")
    ).unwrap();

    pub static ref TRAINER_STEPS: IntGauge = IntGauge::with_opts(
        Opts::new("mirage_trainer_steps", "Training steps completed in this process")
    ).unwrap();

    pub static ref TRAINER_UNDERFILL_SKIPS: IntGauge = IntGauge::with_opts(
        Opts::new("mirage_trainer_underfill_skips", "Training steps skipped for lack of replay data")
    ).unwrap();

    pub static ref TRAINER_FAILED_STEPS: IntGauge = IntGauge::with_opts(
        Opts::new("mirage_trainer_failed_steps", "Training steps that failed and were skipped")
    ).unwrap();

    pub static ref TRAINER_RESTARTS: IntGauge = IntGauge::with_opts(
        Opts::new("mirage_trainer_restarts", "Trainer loop restarts after storage contention")
    ).unwrap();

    // ========== Resource Metrics ==========

    pub static ref MEMORY_RSS_BYTES: IntGauge = IntGauge::with_opts(
        Opts::new("mirage_memory_rss_bytes", "Resident set size in bytes")
    ).unwrap();

    /// Actor metadata with labels for game type and actor ID
    pub static ref ACTOR_INFO: IntGaugeVec = IntGaugeVec::new(
        Opts::new("mirage_actor_info", "Actor metadata"),
        &["game", "actor_id"]
    ).unwrap();
}

static INIT: Once = Once::new();

/// Register all metrics with the registry. Safe to call repeatedly.
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(GAMES_TOTAL.clone()),
            Box::new(GAME_TERMINATIONS.clone()),
            Box::new(EMPTY_GAMES.clone()),
            Box::new(GAME_DURATION.clone()),
            Box::new(GAME_STEPS.clone()),
            Box::new(MOVES_TOTAL.clone()),
            Box::new(BUDGET_EXHAUSTED_MOVES.clone()),
            Box::new(SIMULATIONS_PER_SEARCH.clone()),
            Box::new(SEARCH_SECONDS.clone()),
            Box::new(MODEL_RELOADS.clone()),
            Box::new(MODEL_VERSION.clone()),
            Box::new(REPLAY_STEPS.clone()),
            Box::new(TRAINER_STEPS.clone()),
            Box::new(TRAINER_UNDERFILL_SKIPS.clone()),
            Box::new(TRAINER_FAILED_STEPS.clone()),
            Box::new(TRAINER_RESTARTS.clone()),
            Box::new(MEMORY_RSS_BYTES.clone()),
            Box::new(ACTOR_INFO.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                warn!(error = %e, "Failed to register metric");
            }
        }
    });
}

/// Set actor info labels (call once at startup after initializing)
pub fn set_actor_info(game: &str, actor_id: &str) {
    ACTOR_INFO.with_label_values(&[game, actor_id]).set(1);
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record one search.
pub fn record_search(simulations: u32, elapsed: Duration, budget_exhausted: bool) {
    MOVES_TOTAL.inc();
    SIMULATIONS_PER_SEARCH.observe(simulations as f64);
    SEARCH_SECONDS.observe(elapsed.as_secs_f64());
    if budget_exhausted {
        BUDGET_EXHAUSTED_MOVES.inc();
    }
}

/// Record one finished game.
pub fn record_game(summary: &GameSummary) {
    GAMES_TOTAL.inc();
    GAME_TERMINATIONS
        .with_label_values(&[summary.termination.as_str()])
        .inc();
    if summary.steps == 0 {
        EMPTY_GAMES.inc();
    }
    GAME_DURATION.observe(summary.duration.as_secs_f64());
    GAME_STEPS.observe(summary.steps as f64);
}

/// Update memory RSS gauge from /proc/self/status (Linux only)
pub fn update_memory_metrics() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(contents) = std::fs::read_to_string("/proc/self/status") {
            for line in contents.lines() {
                if line.starts_with("VmRSS:") {
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<i64>() {
                            MEMORY_RSS_BYTES.set(kb * 1024);
                        }
                    }
                    break;
                }
            }
        }
    }
}
