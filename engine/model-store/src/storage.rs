//! Shared storage for the current model version.
//!
//! The current version lives behind `RwLock<Arc<ModelVersion>>`. Readers clone
//! the `Arc` and drop the lock immediately, so a fetch never waits on network
//! inference or on another reader. Publishing builds the new version outside
//! the lock and then swaps the pointer, so a reader sees either the old
//! version or the new one, never a mix. Publishers are serialized by a
//! separate mutex.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::StorageError;

/// Weight of the newest game in the running performance averages.
const PERFORMANCE_EMA_ALPHA: f64 = 0.05;

/// An immutable snapshot of model weights.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelVersion {
    pub weights: Arc<[u8]>,
    pub version: u64,
    pub training_step: u64,
    /// Unix timestamp (seconds) of the publish.
    pub published_at: u64,
}

impl ModelVersion {
    pub fn new(weights: impl Into<Arc<[u8]>>, version: u64, training_step: u64) -> Self {
        Self {
            weights: weights.into(),
            version,
            training_step,
            published_at: unix_now(),
        }
    }
}

/// Summary statistics exposed by [`SharedStorage::stats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
    pub version: u64,
    pub training_step: u64,
    /// Publishes since this storage was created.
    pub published_versions: u64,
    pub games_recorded: u64,
    /// Running average of final game rewards.
    pub mean_outcome: f64,
    /// Running average of game length in moves.
    pub mean_game_length: f64,
}

#[derive(Debug, Default)]
struct Performance {
    games: u64,
    mean_outcome: f64,
    mean_length: f64,
}

/// Versioned store of the current model, shared by the trainer and workers.
#[derive(Debug)]
pub struct SharedStorage {
    current: RwLock<Arc<ModelVersion>>,
    latest_version: AtomicU64,
    publish_lock: Mutex<()>,
    published: AtomicU64,
    performance: Mutex<Performance>,
}

impl SharedStorage {
    /// Storage whose initial model (version 0, step 0) has the given weights.
    pub fn new(initial_weights: impl Into<Arc<[u8]>>) -> Self {
        Self::with_initial(ModelVersion::new(initial_weights, 0, 0))
    }

    /// Storage starting from an existing version, e.g. a restored checkpoint.
    pub fn with_initial(model: ModelVersion) -> Self {
        let version = model.version;
        Self {
            current: RwLock::new(Arc::new(model)),
            latest_version: AtomicU64::new(version),
            publish_lock: Mutex::new(()),
            published: AtomicU64::new(0),
            performance: Mutex::new(Performance::default()),
        }
    }

    /// The current model. Never blocks behind inference; waits at most for a
    /// pointer swap.
    pub fn fetch_latest(&self) -> Arc<ModelVersion> {
        // The guarded value is a single Arc, so a poisoned lock still holds a
        // complete version.
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Version number of the current model, without taking any lock.
    #[inline]
    pub fn latest_version(&self) -> u64 {
        self.latest_version.load(Ordering::Acquire)
    }

    /// Publish new weights. Returns the new version number.
    pub fn publish(
        &self,
        weights: impl Into<Arc<[u8]>>,
        training_step: u64,
    ) -> Result<u64, StorageError> {
        let _publishing = self.lock_publish();
        let base = self.fetch_latest().version;
        self.swap_in(base, weights.into(), training_step)
    }

    /// Publish only if the current version is still `base_version`.
    ///
    /// Fails with [`StorageError::Contention`] when another publish got there
    /// first.
    pub fn publish_from(
        &self,
        base_version: u64,
        weights: impl Into<Arc<[u8]>>,
        training_step: u64,
    ) -> Result<u64, StorageError> {
        let _publishing = self.lock_publish();
        let found = self.fetch_latest().version;
        if found != base_version {
            return Err(StorageError::Contention {
                expected: base_version,
                found,
            });
        }
        self.swap_in(base_version, weights, training_step)
    }

    /// Must be called with the publish lock held.
    fn swap_in(
        &self,
        base_version: u64,
        weights: impl Into<Arc<[u8]>>,
        training_step: u64,
    ) -> Result<u64, StorageError> {
        // Both counters move together under the publish lock; disagreement
        // means something published around it.
        let advertised = self.latest_version();
        if advertised != base_version {
            return Err(StorageError::Contention {
                expected: base_version,
                found: advertised,
            });
        }

        let next = base_version + 1;
        let model = Arc::new(ModelVersion::new(weights, next, training_step));
        let bytes = model.weights.len();
        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            *current = model;
        }
        self.latest_version.store(next, Ordering::Release);
        self.published.fetch_add(1, Ordering::Relaxed);

        info!(version = next, training_step, bytes, "Published model version");
        Ok(next)
    }

    fn lock_publish(&self) -> MutexGuard<'_, ()> {
        self.publish_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fold one finished game into the running performance statistics.
    pub fn record_game(&self, outcome: f32, length: usize) {
        let mut perf = self.performance.lock().unwrap_or_else(|e| e.into_inner());
        let outcome = outcome as f64;
        let length = length as f64;
        if perf.games == 0 {
            perf.mean_outcome = outcome;
            perf.mean_length = length;
        } else {
            let a = PERFORMANCE_EMA_ALPHA;
            perf.mean_outcome = a * outcome + (1.0 - a) * perf.mean_outcome;
            perf.mean_length = a * length + (1.0 - a) * perf.mean_length;
        }
        perf.games += 1;
        debug!(games = perf.games, outcome, length, "Recorded game");
    }

    /// Training step of the current model.
    pub fn training_step(&self) -> u64 {
        self.fetch_latest().training_step
    }

    pub fn stats(&self) -> StorageStats {
        let model = self.fetch_latest();
        let perf = self.performance.lock().unwrap_or_else(|e| e.into_inner());
        StorageStats {
            version: model.version,
            training_step: model.training_step,
            published_versions: self.published.load(Ordering::Relaxed),
            games_recorded: perf.games,
            mean_outcome: perf.mean_outcome,
            mean_game_length: perf.mean_length,
        }
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
