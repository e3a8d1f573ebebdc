//! The training loop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use model_store::{CheckpointStore, SharedStorage, StorageError};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use replay_buffer::{ReplayBuffer, ReplayError, SampleKey};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::TrainerConfig;
use crate::optimizer::{Optimizer, OptimizerError};

#[derive(Debug, Error)]
pub enum TrainerError {
    /// Not enough replay data yet. The step is skipped and retried.
    #[error("Replay buffer under-filled: {available} of {required} steps")]
    Underfill { available: usize, required: usize },

    #[error("Replay buffer failure: {0}")]
    Replay(ReplayError),

    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Gave up after {count} consecutive failed training steps: {last}")]
    TooManyFailures { count: u32, last: String },
}

impl TrainerError {
    /// Contention at shared storage ends the loop; everything else skips a step.
    pub fn is_contention(&self) -> bool {
        matches!(self, TrainerError::Storage(e) if e.is_contention())
    }

    pub fn is_underfill(&self) -> bool {
        matches!(self, TrainerError::Underfill { .. })
    }
}

impl From<ReplayError> for TrainerError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::Underfill {
                available,
                required,
            } => TrainerError::Underfill {
                available,
                required,
            },
            other => TrainerError::Replay(other),
        }
    }
}

/// Outcome of one successful training step.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainStepSummary {
    pub training_step: u64,
    pub model_version: u64,
    pub loss: f32,
    pub batch_size: usize,
    pub priorities_updated: usize,
    pub checkpointed: bool,
}

/// Totals for one call to [`Trainer::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrainerRunSummary {
    pub steps: u64,
    pub underfill_skips: u64,
    pub failed_steps: u64,
    pub final_version: u64,
    pub last_loss: Option<f32>,
}

/// Live counters, readable from other threads while the trainer runs.
#[derive(Debug, Default)]
pub struct TrainerCounters {
    pub steps: AtomicU64,
    pub underfill_skips: AtomicU64,
    pub failed_steps: AtomicU64,
    pub restarts: AtomicU64,
}

impl TrainerCounters {
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    pub fn underfill_skips(&self) -> u64 {
        self.underfill_skips.load(Ordering::Relaxed)
    }

    pub fn failed_steps(&self) -> u64 {
        self.failed_steps.load(Ordering::Relaxed)
    }

    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }
}

/// Samples replay, applies the optimizer and publishes new weights.
pub struct Trainer<O: Optimizer> {
    config: TrainerConfig,
    optimizer: O,
    replay: Arc<ReplayBuffer>,
    storage: Arc<SharedStorage>,
    checkpoints: Option<CheckpointStore>,
    counters: Arc<TrainerCounters>,
    rng: ChaCha20Rng,
    training_step: u64,
}

impl<O: Optimizer> Trainer<O> {
    pub fn new(
        config: TrainerConfig,
        optimizer: O,
        replay: Arc<ReplayBuffer>,
        storage: Arc<SharedStorage>,
    ) -> Self {
        let rng = ChaCha20Rng::seed_from_u64(config.seed);
        let training_step = storage.training_step();
        Self {
            config,
            optimizer,
            replay,
            storage,
            checkpoints: None,
            counters: Arc::new(TrainerCounters::default()),
            rng,
            training_step,
        }
    }

    pub fn with_checkpoints(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn with_counters(mut self, counters: Arc<TrainerCounters>) -> Self {
        self.counters = counters;
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn counters(&self) -> Arc<TrainerCounters> {
        Arc::clone(&self.counters)
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn training_step(&self) -> u64 {
        self.training_step
    }

    /// Run one step: wait for fill, sample, optimize, publish, update
    /// priorities, and checkpoint when due.
    ///
    /// Priorities are only written back once the new weights are published,
    /// so a failed step leaves the buffer untouched.
    pub fn train_step(&mut self) -> Result<TrainStepSummary, TrainerError> {
        self.replay
            .wait_for_fill(self.config.required_fill(), self.config.fill_timeout)?;
        let batch = self.replay.sample(self.config.batch_size, &mut self.rng)?;

        let base = self.storage.fetch_latest();
        let update = self.optimizer.update(&base.weights, &batch)?;

        if !update.new_priorities.is_empty() && update.new_priorities.len() != batch.len() {
            return Err(OptimizerError::PriorityMismatch {
                expected: batch.len(),
                got: update.new_priorities.len(),
            }
            .into());
        }

        let next_step = self.training_step + 1;
        let model_version = self
            .storage
            .publish_from(base.version, update.weights, next_step)?;
        self.training_step = next_step;

        let priorities_updated = if update.new_priorities.is_empty() {
            0
        } else {
            let updates: Vec<(SampleKey, f32)> = batch
                .iter()
                .map(|s| s.key)
                .zip(update.new_priorities.iter().copied())
                .collect();
            match self.replay.update_priorities(&updates) {
                Ok(n) => n,
                Err(e) => {
                    warn!(training_step = next_step, error = %e, "Priority update failed");
                    0
                }
            }
        };

        let checkpointed = self.maybe_checkpoint();

        debug!(
            training_step = next_step,
            version = model_version,
            loss = update.loss,
            batch = batch.len(),
            "Training step complete"
        );
        Ok(TrainStepSummary {
            training_step: next_step,
            model_version,
            loss: update.loss,
            batch_size: batch.len(),
            priorities_updated,
            checkpointed,
        })
    }

    /// Checkpoint failures are logged; training carries on.
    fn maybe_checkpoint(&self) -> bool {
        let interval = self.config.checkpoint_interval;
        let Some(store) = &self.checkpoints else {
            return false;
        };
        if interval == 0 || self.training_step % interval != 0 {
            return false;
        }
        match store.save(&self.storage.fetch_latest(), &self.storage.stats()) {
            Ok(_) => true,
            Err(e) => {
                warn!(training_step = self.training_step, error = %e, "Checkpoint failed");
                false
            }
        }
    }

    fn reached_max_steps(&self) -> bool {
        self.config.max_steps > 0 && self.training_step >= self.config.max_steps
    }

    /// Train until `stop` is set or `max_steps` is reached.
    ///
    /// Under-filled and failed steps are skipped after a backoff. Storage
    /// contention, or `max_consecutive_failures` failed steps in a row, ends
    /// the loop with an error so a supervisor can act on it.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<TrainerRunSummary, TrainerError> {
        // Another trainer instance may have published since this one last ran
        self.training_step = self.training_step.max(self.storage.training_step());

        info!(
            training_step = self.training_step,
            max_steps = self.config.max_steps,
            batch_size = self.config.batch_size,
            "Trainer starting"
        );

        let started = Instant::now();
        let mut summary = TrainerRunSummary::default();
        let mut consecutive_failures = 0u32;
        while !stop.load(Ordering::Relaxed) && !self.reached_max_steps() {
            match self.train_step() {
                Ok(step) => {
                    consecutive_failures = 0;
                    summary.steps += 1;
                    summary.last_loss = Some(step.loss);
                    self.counters.steps.fetch_add(1, Ordering::Relaxed);

                    let interval = self.config.log_interval;
                    if interval > 0 && step.training_step % interval == 0 {
                        info!(
                            training_step = step.training_step,
                            version = step.model_version,
                            loss = step.loss,
                            replay_steps = self.replay.size(),
                            elapsed_secs = started.elapsed().as_secs(),
                            "Training progress"
                        );
                    }
                }
                Err(e) if e.is_contention() => {
                    error!(error = %e, "Storage contention, stopping trainer loop");
                    return Err(e);
                }
                Err(e) if e.is_underfill() => {
                    summary.underfill_skips += 1;
                    self.counters.underfill_skips.fetch_add(1, Ordering::Relaxed);
                    debug!(error = %e, "Skipping training step");
                    sleep_unless_stopped(self.config.underfill_backoff, stop);
                }
                Err(e) => {
                    summary.failed_steps += 1;
                    self.counters.failed_steps.fetch_add(1, Ordering::Relaxed);
                    consecutive_failures += 1;
                    let limit = self.config.max_consecutive_failures;
                    if limit > 0 && consecutive_failures >= limit {
                        error!(
                            failures = consecutive_failures,
                            error = %e,
                            "Too many failed training steps, stopping trainer loop"
                        );
                        return Err(TrainerError::TooManyFailures {
                            count: consecutive_failures,
                            last: e.to_string(),
                        });
                    }
                    warn!(
                        failures = consecutive_failures,
                        error = %e,
                        "Training step failed, skipping"
                    );
                    sleep_unless_stopped(self.config.failure_backoff, stop);
                }
            }
        }

        summary.final_version = self.storage.latest_version();
        info!(
            steps = summary.steps,
            underfill_skips = summary.underfill_skips,
            failed_steps = summary.failed_steps,
            version = summary.final_version,
            "Trainer stopped"
        );
        Ok(summary)
    }
}

/// Sleep in short slices so a stop request is noticed promptly.
fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(50);
    let deadline = Instant::now() + total;
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{ModelUpdate, PassthroughOptimizer};
    use engine_core::Observation;
    use replay_buffer::{
        PriorityMode, ReplayConfig, SampledStep, TerminationReason, Trajectory, TrajectoryStep,
    };

    fn trajectory(game_id: &str, steps: usize, root_value: f32) -> Trajectory {
        let mut t = Trajectory::new("corridor", game_id, 0, 0);
        for i in 0..steps {
            t.push_step(TrajectoryStep {
                observation: Observation::flat(vec![i as f32, 0.0]),
                action: 1,
                search_policy: vec![0.25, 0.75],
                reward: if i + 1 == steps { 1.0 } else { 0.0 },
                root_value,
                to_play: 0,
                budget_exhausted: false,
                simulations: 8,
            });
        }
        t.finish(TerminationReason::Normal, true);
        t
    }

    fn filled_buffer(steps: usize) -> Arc<ReplayBuffer> {
        let buffer = Arc::new(ReplayBuffer::new(ReplayConfig::for_testing()));
        buffer.push(trajectory("g0", steps, 0.5)).unwrap();
        buffer
    }

    /// Appends a byte per update, so every publish is distinguishable.
    struct CountingOptimizer;

    impl Optimizer for CountingOptimizer {
        fn update(
            &mut self,
            weights: &[u8],
            _batch: &[SampledStep],
        ) -> Result<ModelUpdate, OptimizerError> {
            let mut next = weights.to_vec();
            next.push(next.len() as u8);
            Ok(ModelUpdate {
                weights: next,
                loss: 0.5,
                new_priorities: Vec::new(),
            })
        }
    }

    /// Fails every other call.
    struct FlakyOptimizer {
        calls: u32,
    }

    impl Optimizer for FlakyOptimizer {
        fn update(
            &mut self,
            weights: &[u8],
            _batch: &[SampledStep],
        ) -> Result<ModelUpdate, OptimizerError> {
            self.calls += 1;
            if self.calls % 2 == 1 {
                return Err(OptimizerError::MalformedBatch("bad batch".into()));
            }
            Ok(ModelUpdate {
                weights: weights.to_vec(),
                loss: 0.0,
                new_priorities: Vec::new(),
            })
        }
    }

    /// Never produces an update.
    struct BrokenOptimizer;

    impl Optimizer for BrokenOptimizer {
        fn update(
            &mut self,
            _weights: &[u8],
            _batch: &[SampledStep],
        ) -> Result<ModelUpdate, OptimizerError> {
            Err(OptimizerError::Failed("no gradient".into()))
        }
    }

    /// Publishes behind the trainer's back, forcing contention.
    struct RacingOptimizer {
        storage: Arc<SharedStorage>,
        priority: Option<f32>,
    }

    impl Optimizer for RacingOptimizer {
        fn update(
            &mut self,
            weights: &[u8],
            batch: &[SampledStep],
        ) -> Result<ModelUpdate, OptimizerError> {
            self.storage
                .publish(vec![9u8], 0)
                .map_err(|e| OptimizerError::Failed(e.to_string()))?;
            let new_priorities = match self.priority {
                Some(p) => vec![p; batch.len()],
                None => Vec::new(),
            };
            Ok(ModelUpdate {
                weights: weights.to_vec(),
                loss: 0.0,
                new_priorities,
            })
        }
    }

    #[test]
    fn test_train_step_publishes_new_version() {
        let storage = Arc::new(SharedStorage::new(vec![0u8]));
        let mut trainer = Trainer::new(
            TrainerConfig::for_testing(),
            CountingOptimizer,
            filled_buffer(10),
            Arc::clone(&storage),
        );

        let summary = trainer.train_step().unwrap();
        assert_eq!(summary.training_step, 1);
        assert_eq!(summary.model_version, 1);
        assert_eq!(summary.batch_size, 4);

        let model = storage.fetch_latest();
        assert_eq!(model.version, 1);
        assert_eq!(model.training_step, 1);
        assert_eq!(&model.weights[..], &[0, 1]);

        let summary = trainer.train_step().unwrap();
        assert_eq!(summary.model_version, 2);
        assert_eq!(storage.fetch_latest().weights.len(), 3);
    }

    #[test]
    fn test_underfill_is_reported() {
        let buffer = Arc::new(ReplayBuffer::new(ReplayConfig::for_testing()));
        buffer.push(trajectory("short", 2, 0.0)).unwrap();
        let mut trainer = Trainer::new(
            TrainerConfig::for_testing(),
            CountingOptimizer,
            buffer,
            Arc::new(SharedStorage::new(Vec::<u8>::new())),
        );

        match trainer.train_step() {
            Err(TrainerError::Underfill {
                available,
                required,
            }) => {
                assert_eq!(available, 2);
                assert_eq!(required, 4);
            }
            other => panic!("expected underfill, got {other:?}"),
        }
        assert_eq!(trainer.training_step(), 0);
    }

    #[test]
    fn test_passthrough_updates_priorities() {
        let buffer = Arc::new(ReplayBuffer::new(
            ReplayConfig::for_testing().with_priority(PriorityMode::ValueError, 1.0, 1.0),
        ));
        buffer.push(trajectory("g", 8, 0.5)).unwrap();
        let storage = Arc::new(SharedStorage::new(vec![7u8; 3]));
        let mut trainer = Trainer::new(
            TrainerConfig::for_testing(),
            PassthroughOptimizer::new(),
            buffer,
            Arc::clone(&storage),
        );

        let summary = trainer.train_step().unwrap();
        assert_eq!(summary.priorities_updated, 4);
        assert!(summary.loss.is_finite() && summary.loss >= 0.0);
        assert_eq!(&storage.fetch_latest().weights[..], &[7, 7, 7]);
        assert_eq!(trainer.optimizer().updates(), 1);
    }

    #[test]
    fn test_run_stops_at_max_steps() {
        let storage = Arc::new(SharedStorage::new(vec![0u8]));
        let mut trainer = Trainer::new(
            TrainerConfig::for_testing().with_max_steps(5),
            CountingOptimizer,
            filled_buffer(10),
            Arc::clone(&storage),
        );

        let summary = trainer.run(&AtomicBool::new(false)).unwrap();
        assert_eq!(summary.steps, 5);
        assert_eq!(summary.final_version, 5);
        assert_eq!(storage.training_step(), 5);
        assert_eq!(trainer.counters().steps(), 5);

        // Already at the limit: a second run does nothing
        let summary = trainer.run(&AtomicBool::new(false)).unwrap();
        assert_eq!(summary.steps, 0);
    }

    #[test]
    fn test_run_skips_failed_steps() {
        let storage = Arc::new(SharedStorage::new(vec![0u8]));
        let mut trainer = Trainer::new(
            TrainerConfig::for_testing().with_max_steps(3),
            FlakyOptimizer { calls: 0 },
            filled_buffer(10),
            Arc::clone(&storage),
        );

        let summary = trainer.run(&AtomicBool::new(false)).unwrap();
        assert_eq!(summary.steps, 3);
        assert_eq!(summary.failed_steps, 3);
        assert_eq!(storage.latest_version(), 3);
    }

    #[test]
    fn test_run_backs_off_on_underfill_until_stopped() {
        let buffer = Arc::new(ReplayBuffer::new(ReplayConfig::for_testing()));
        let stop = Arc::new(AtomicBool::new(false));
        let mut trainer = Trainer::new(
            TrainerConfig::for_testing(),
            CountingOptimizer,
            buffer,
            Arc::new(SharedStorage::new(Vec::<u8>::new())),
        );

        let stopper = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(100));
                stop.store(true, Ordering::Relaxed);
            })
        };
        let summary = trainer.run(&stop).unwrap();
        stopper.join().unwrap();

        assert_eq!(summary.steps, 0);
        assert!(summary.underfill_skips >= 1);
        assert_eq!(summary.final_version, 0);
    }

    #[test]
    fn test_contention_ends_run() {
        let storage = Arc::new(SharedStorage::new(vec![0u8]));
        let mut trainer = Trainer::new(
            TrainerConfig::for_testing().with_max_steps(10),
            RacingOptimizer {
                storage: Arc::clone(&storage),
                priority: None,
            },
            filled_buffer(10),
            Arc::clone(&storage),
        );

        let err = trainer.run(&AtomicBool::new(false)).unwrap_err();
        assert!(err.is_contention());
        // Only the racing publish landed
        assert_eq!(storage.latest_version(), 1);
        assert_eq!(trainer.training_step(), 0);
    }

    #[test]
    fn test_checkpoints_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(SharedStorage::new(vec![0u8]));
        let mut trainer = Trainer::new(
            TrainerConfig::for_testing()
                .with_max_steps(4)
                .with_checkpoint_interval(2),
            CountingOptimizer,
            filled_buffer(10),
            Arc::clone(&storage),
        )
        .with_checkpoints(CheckpointStore::new(dir.path(), 10));

        trainer.run(&AtomicBool::new(false)).unwrap();

        let saved = CheckpointStore::new(dir.path(), 10).list().unwrap();
        assert_eq!(saved, vec![2, 4]);
    }

    #[test]
    fn test_resumes_from_storage_training_step() {
        let storage = Arc::new(SharedStorage::new(vec![0u8]));
        storage.publish(vec![1u8], 40).unwrap();
        let mut trainer = Trainer::new(
            TrainerConfig::for_testing(),
            CountingOptimizer,
            filled_buffer(10),
            Arc::clone(&storage),
        );
        assert_eq!(trainer.training_step(), 40);
        assert_eq!(trainer.train_step().unwrap().training_step, 41);
    }

    #[test]
    fn test_contention_leaves_priorities_untouched() {
        let buffer = Arc::new(ReplayBuffer::new(
            ReplayConfig::for_testing().with_priority(PriorityMode::ValueError, 1.0, 1.0),
        ));
        buffer.push(trajectory("g", 10, 0.5)).unwrap();
        let sample_keys = |buffer: &ReplayBuffer| -> Vec<SampleKey> {
            let mut rng = ChaCha20Rng::seed_from_u64(11);
            buffer
                .sample(8, &mut rng)
                .unwrap()
                .iter()
                .map(|s| s.key)
                .collect()
        };
        let before = sample_keys(&buffer);

        let storage = Arc::new(SharedStorage::new(vec![0u8]));
        let mut trainer = Trainer::new(
            TrainerConfig::for_testing(),
            RacingOptimizer {
                storage: Arc::clone(&storage),
                priority: Some(1000.0),
            },
            Arc::clone(&buffer),
            Arc::clone(&storage),
        );

        let err = trainer.train_step().unwrap_err();
        assert!(err.is_contention());
        assert_eq!(sample_keys(&buffer), before);
    }

    #[test]
    fn test_consecutive_failures_end_run() {
        let storage = Arc::new(SharedStorage::new(vec![0u8]));
        let mut trainer = Trainer::new(
            TrainerConfig::for_testing()
                .with_max_steps(1)
                .with_failure_limit(5, Duration::from_millis(1)),
            BrokenOptimizer,
            filled_buffer(10),
            Arc::clone(&storage),
        );

        let err = trainer.run(&AtomicBool::new(false)).unwrap_err();
        match err {
            TrainerError::TooManyFailures { count, last } => {
                assert_eq!(count, 5);
                assert!(last.contains("no gradient"));
            }
            other => panic!("expected too many failures, got {other:?}"),
        }
        assert_eq!(storage.latest_version(), 0);
        assert_eq!(trainer.counters().failed_steps(), 5);
    }

    #[test]
    fn test_failed_steps_back_off() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut trainer = Trainer::new(
            TrainerConfig::for_testing().with_failure_limit(0, Duration::from_millis(20)),
            BrokenOptimizer,
            filled_buffer(10),
            Arc::new(SharedStorage::new(vec![0u8])),
        );

        let stopper = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(100));
                stop.store(true, Ordering::Relaxed);
            })
        };
        let summary = trainer.run(&stop).unwrap();
        stopper.join().unwrap();

        assert!(summary.failed_steps >= 1);
        assert!(summary.failed_steps <= 10, "{} failures", summary.failed_steps);
        assert_eq!(summary.steps, 0);
    }
}
