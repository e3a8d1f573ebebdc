//! Bounded prioritized replay buffer.
//!
//! Trajectories are stored whole behind an `Arc` and never mutated. Capacity
//! is counted in steps: when a push takes the buffer over capacity, steps are
//! dropped from the front of old trajectories (FIFO, optionally skewed toward
//! the lowest-priority trajectory among the oldest few) until it fits again.
//! Eviction only advances a per-entry start offset, so a sample holding an
//! `Arc` to a trajectory keeps seeing the same immutable data.
//!
//! All bookkeeping sits behind one mutex. Producers hold it for an append and
//! eviction; the trainer holds it only while drawing sample positions. Value
//! targets and importance weights are computed after the lock is released.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::{PriorityMode, ReplayConfig};
use crate::trajectory::{Trajectory, TrajectoryStep};

/// Floor for stored priorities so every step stays reachable.
const MIN_PRIORITY: f32 = 1e-6;

/// Errors from the replay buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("Replay buffer under-filled: {available} steps available, {required} required")]
    Underfill { available: usize, required: usize },

    #[error("Cannot store an empty trajectory")]
    EmptyTrajectory,

    #[error("Replay buffer lock poisoned")]
    Poisoned,
}

/// Identifies one stored step for priority updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleKey {
    pub entry_id: u64,
    pub position: usize,
}

/// One sampled step with its training target and correction weight.
#[derive(Debug, Clone)]
pub struct SampledStep {
    pub key: SampleKey,
    pub trajectory: Arc<Trajectory>,

    /// n-step value target for this step.
    pub value_target: f32,

    /// Importance-sampling weight `(N * P)^-beta`, normalized so the batch
    /// maximum is 1.
    pub importance_weight: f32,
}

impl SampledStep {
    #[inline]
    pub fn step(&self) -> &TrajectoryStep {
        &self.trajectory.steps[self.key.position]
    }
}

/// Accounting counters. `pushed_steps - evicted_steps == stored_steps` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub pushed_trajectories: u64,
    pub pushed_steps: u64,
    pub evicted_trajectories: u64,
    pub evicted_steps: u64,
    pub stored_trajectories: usize,
    pub stored_steps: usize,
}

/// A stored trajectory and the first step still retained.
#[derive(Debug, Clone)]
pub struct RetainedTrajectory {
    pub entry_id: u64,
    pub trajectory: Arc<Trajectory>,
    pub first_step: usize,
}

struct Entry {
    id: u64,
    trajectory: Arc<Trajectory>,
    start: usize,
    priorities: Vec<f32>,
    total: f64,
}

impl Entry {
    #[inline]
    fn len(&self) -> usize {
        self.trajectory.len() - self.start
    }

    fn mean_priority(&self) -> f64 {
        self.total / self.len().max(1) as f64
    }

    fn recompute_total(&mut self) {
        self.total = self.priorities[self.start..]
            .iter()
            .map(|&p| p as f64)
            .sum();
    }
}

#[derive(Default)]
struct Inner {
    entries: VecDeque<Entry>,
    next_id: u64,
    stats: ReplayStats,
}

impl Inner {
    /// Drop steps until `stored_steps <= capacity`. Returns the number dropped.
    fn evict_to(&mut self, capacity: usize, window: usize) -> usize {
        let mut evicted = 0;
        while self.stats.stored_steps > capacity && !self.entries.is_empty() {
            let excess = self.stats.stored_steps - capacity;
            let window = window.clamp(1, self.entries.len());

            // Lowest mean priority among the oldest `window`; ties keep the oldest
            let mut victim = 0;
            for i in 1..window {
                if self.entries[i].mean_priority() < self.entries[victim].mean_priority() {
                    victim = i;
                }
            }

            let entry = &mut self.entries[victim];
            let take = excess.min(entry.len());
            entry.start += take;
            let emptied = entry.len() == 0;
            if !emptied {
                entry.recompute_total();
            }

            self.stats.stored_steps -= take;
            self.stats.evicted_steps += take as u64;
            evicted += take;

            if emptied {
                self.entries.remove(victim);
                self.stats.evicted_trajectories += 1;
            }
        }
        self.stats.stored_trajectories = self.entries.len();
        evicted
    }

    fn position_of(&self, entry_id: u64) -> Option<usize> {
        self.entries.binary_search_by_key(&entry_id, |e| e.id).ok()
    }
}

/// Bounded, concurrently accessed store of trajectories.
pub struct ReplayBuffer {
    config: ReplayConfig,
    inner: Mutex<Inner>,
    filled: Condvar,
    size: AtomicUsize,
}

impl ReplayBuffer {
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
            filled: Condvar::new(),
            size: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity_steps
    }

    /// Number of stored steps. Never exceeds [`capacity`](Self::capacity).
    #[inline]
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, ReplayError> {
        self.inner.lock().map_err(|_| ReplayError::Poisoned)
    }

    /// Store a finished trajectory, evicting old steps if over capacity.
    ///
    /// Returns the number of steps evicted to make room.
    pub fn push(&self, trajectory: Trajectory) -> Result<usize, ReplayError> {
        if trajectory.is_empty() {
            return Err(ReplayError::EmptyTrajectory);
        }

        let priorities = self.initial_priorities(&trajectory);
        let steps = trajectory.len();
        let game_id = trajectory.game_id.clone();
        let trajectory = Arc::new(trajectory);

        let (evicted, stored) = {
            let mut inner = self.lock()?;
            let id = inner.next_id;
            inner.next_id += 1;

            let mut entry = Entry {
                id,
                trajectory,
                start: 0,
                priorities,
                total: 0.0,
            };
            entry.recompute_total();
            inner.entries.push_back(entry);
            inner.stats.pushed_trajectories += 1;
            inner.stats.pushed_steps += steps as u64;
            inner.stats.stored_steps += steps;

            let evicted = inner.evict_to(self.config.capacity_steps, self.config.eviction_window);
            self.size.store(inner.stats.stored_steps, Ordering::Release);
            (evicted, inner.stats.stored_steps)
        };
        self.filled.notify_all();

        debug!(
            game_id = %game_id,
            steps,
            evicted,
            stored,
            "Stored trajectory"
        );
        Ok(evicted)
    }

    /// Draw `batch_size` steps with probability proportional to priority.
    ///
    /// Sampling is with replacement. Each step carries its n-step value target
    /// and an importance-sampling weight.
    pub fn sample(
        &self,
        batch_size: usize,
        rng: &mut ChaCha20Rng,
    ) -> Result<Vec<SampledStep>, ReplayError> {
        if batch_size == 0 {
            return Ok(Vec::new());
        }

        let (picks, stored) = {
            let inner = self.lock()?;
            let stored = inner.stats.stored_steps;
            if stored == 0 {
                return Err(ReplayError::Underfill {
                    available: 0,
                    required: batch_size,
                });
            }

            let weights: Vec<f64> = inner
                .entries
                .iter()
                .enumerate()
                .map(|(rank, entry)| self.recency_factor(rank) * entry.total)
                .collect();
            let total: f64 = weights.iter().sum();

            let mut picks = Vec::with_capacity(batch_size);
            for _ in 0..batch_size {
                let Some(index) = pick_weighted(&weights, rng.gen::<f64>() * total) else {
                    continue;
                };
                let entry = &inner.entries[index];
                let live = &entry.priorities[entry.start..];
                let target = rng.gen::<f64>() * entry.total;
                let Some(offset) =
                    pick_weighted_iter(live.iter().map(|&p| p as f64), target)
                else {
                    continue;
                };
                let probability = self.recency_factor(index) * live[offset] as f64 / total;
                picks.push((
                    SampleKey {
                        entry_id: entry.id,
                        position: entry.start + offset,
                    },
                    Arc::clone(&entry.trajectory),
                    probability,
                ));
            }
            (picks, stored)
        };

        let beta = self.config.priority_beta as f64;
        let raw: Vec<f64> = picks
            .iter()
            .map(|(_, _, p)| (stored as f64 * p).powf(-beta))
            .collect();
        let max_weight = raw.iter().cloned().fold(0.0f64, f64::max);

        let samples: Vec<SampledStep> = picks
            .into_iter()
            .zip(raw)
            .map(|((key, trajectory, _), w)| {
                let value_target =
                    trajectory.value_target(key.position, self.config.td_steps, self.config.discount);
                let importance_weight = if max_weight > 0.0 && max_weight.is_finite() {
                    (w / max_weight) as f32
                } else {
                    1.0
                };
                SampledStep {
                    key,
                    trajectory,
                    value_target,
                    importance_weight,
                }
            })
            .collect();

        trace!(batch = samples.len(), stored, "Sampled replay batch");
        Ok(samples)
    }

    /// Replace priorities of sampled steps with new absolute errors.
    ///
    /// Only meaningful in [`PriorityMode::ValueError`]; other modes ignore
    /// updates. Keys whose step has since been evicted are skipped. Returns the
    /// number of priorities changed.
    pub fn update_priorities(&self, updates: &[(SampleKey, f32)]) -> Result<usize, ReplayError> {
        if self.config.priority != PriorityMode::ValueError || updates.is_empty() {
            return Ok(0);
        }

        let mut inner = self.lock()?;
        let mut touched: Vec<usize> = Vec::new();
        let mut applied = 0;
        for &(key, error) in updates {
            let Some(index) = inner.position_of(key.entry_id) else {
                continue;
            };
            let entry = &mut inner.entries[index];
            if key.position < entry.start || key.position >= entry.trajectory.len() {
                continue;
            }
            entry.priorities[key.position] = self.priority_from_error(error);
            touched.push(index);
            applied += 1;
        }

        touched.sort_unstable();
        touched.dedup();
        for index in touched {
            inner.entries[index].recompute_total();
        }
        Ok(applied)
    }

    /// Block until at least `min_steps` are stored or `timeout` elapses.
    ///
    /// Returns the stored step count, or [`ReplayError::Underfill`] on timeout.
    pub fn wait_for_fill(&self, min_steps: usize, timeout: Duration) -> Result<usize, ReplayError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock()?;
        loop {
            let stored = inner.stats.stored_steps;
            if stored >= min_steps {
                return Ok(stored);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ReplayError::Underfill {
                    available: stored,
                    required: min_steps,
                });
            }
            let (guard, _) = self
                .filled
                .wait_timeout(inner, deadline - now)
                .map_err(|_| ReplayError::Poisoned)?;
            inner = guard;
        }
    }

    pub fn stats(&self) -> Result<ReplayStats, ReplayError> {
        Ok(self.lock()?.stats)
    }

    /// Stored trajectories, oldest first.
    pub fn retained(&self) -> Result<Vec<RetainedTrajectory>, ReplayError> {
        let inner = self.lock()?;
        Ok(inner
            .entries
            .iter()
            .map(|e| RetainedTrajectory {
                entry_id: e.id,
                trajectory: Arc::clone(&e.trajectory),
                first_step: e.start,
            })
            .collect())
    }

    fn initial_priorities(&self, trajectory: &Trajectory) -> Vec<f32> {
        match self.config.priority {
            PriorityMode::ValueError => trajectory
                .steps
                .iter()
                .enumerate()
                .map(|(i, step)| {
                    let target =
                        trajectory.value_target(i, self.config.td_steps, self.config.discount);
                    self.priority_from_error(step.root_value - target)
                })
                .collect(),
            PriorityMode::Uniform | PriorityMode::Recency => vec![1.0; trajectory.len()],
        }
    }

    fn priority_from_error(&self, error: f32) -> f32 {
        let p = (error.abs() + MIN_PRIORITY).powf(self.config.priority_alpha);
        if p.is_finite() && p >= MIN_PRIORITY {
            p
        } else {
            MIN_PRIORITY
        }
    }

    /// Per-trajectory multiplier; `rank` 0 is the oldest stored trajectory.
    fn recency_factor(&self, rank: usize) -> f64 {
        match self.config.priority {
            PriorityMode::Recency => ((rank + 1) as f64).powf(self.config.priority_alpha as f64),
            PriorityMode::Uniform | PriorityMode::ValueError => 1.0,
        }
    }
}

/// Index whose cumulative weight first exceeds `target`. Rounding past the end
/// falls back to the last positive weight.
fn pick_weighted(weights: &[f64], target: f64) -> Option<usize> {
    pick_weighted_iter(weights.iter().copied(), target)
}

fn pick_weighted_iter(weights: impl Iterator<Item = f64>, target: f64) -> Option<usize> {
    let mut acc = 0.0;
    let mut last = None;
    for (i, w) in weights.enumerate() {
        if w <= 0.0 {
            continue;
        }
        acc += w;
        last = Some(i);
        if target < acc {
            return Some(i);
        }
    }
    last
}
