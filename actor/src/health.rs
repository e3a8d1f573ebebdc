//! Worker health signal.
//!
//! Each self-play worker owns a [`WorkerHealth`]. The pipeline and the
//! binary read it to tell a worker that is making progress from one whose
//! environment keeps failing.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{error, info};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Shared health state between a worker and whoever supervises it.
#[derive(Debug, Clone)]
pub struct WorkerHealth {
    worker_id: usize,
    /// Set once the worker has built its first environment and model.
    ready: Arc<AtomicBool>,
    /// Cleared when the worker gives up.
    healthy: Arc<AtomicBool>,
    /// Unix seconds of the last finished game.
    last_game_time: Arc<AtomicU64>,
    consecutive_env_failures: Arc<AtomicU32>,
    total_env_failures: Arc<AtomicU64>,
}

impl WorkerHealth {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            ready: Arc::new(AtomicBool::new(false)),
            healthy: Arc::new(AtomicBool::new(true)),
            last_game_time: Arc::new(AtomicU64::new(0)),
            consecutive_env_failures: Arc::new(AtomicU32::new(0)),
            total_env_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn set_ready(&self) {
        if !self.ready.swap(true, Ordering::SeqCst) {
            info!(worker = self.worker_id, "Worker ready");
        }
    }

    /// Mark the worker as unhealthy. It stops taking new games.
    pub fn set_unhealthy(&self) {
        self.healthy.store(false, Ordering::SeqCst);
        error!(worker = self.worker_id, "Worker marked as unhealthy");
    }

    pub fn record_game_complete(&self) {
        self.last_game_time.store(unix_now(), Ordering::SeqCst);
    }

    /// Count an environment failure. Returns the consecutive count.
    pub fn record_env_failure(&self) -> u32 {
        self.total_env_failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_env_failures.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn reset_env_failures(&self) {
        self.consecutive_env_failures.store(0, Ordering::SeqCst);
    }

    pub fn consecutive_env_failures(&self) -> u32 {
        self.consecutive_env_failures.load(Ordering::SeqCst)
    }

    pub fn total_env_failures(&self) -> u64 {
        self.total_env_failures.load(Ordering::Relaxed)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    /// Whether a game finished within the last `timeout_secs`.
    pub fn is_making_progress(&self, timeout_secs: u64) -> bool {
        let last = self.last_game_time.load(Ordering::SeqCst);
        if last == 0 {
            // No games yet, which is fine during startup
            return true;
        }
        unix_now().saturating_sub(last) < timeout_secs
    }
}
