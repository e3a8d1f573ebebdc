//! Self-play pipeline: N worker threads and one trainer thread.
//!
//! Workers and the trainer share exactly two resources, the replay buffer
//! and shared storage. Everything else is owned by its thread. A shared
//! shutdown flag stops the workers between games and the trainer between
//! steps.
//!
//! The trainer is supervised: a run that ends in storage contention is
//! restarted up to `max_trainer_restarts` times. Past that the trainer is
//! reported as failed and the pipeline shuts down.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use engine_core::{create_environment, Environment};
use mcts::{BudgetConfig, MctsConfig};
use model_store::{CheckpointStore, SharedStorage};
use replay_buffer::{ReplayBuffer, ReplayConfig};
use tracing::{error, info, warn};
use trainer::{Optimizer, Trainer, TrainerConfig, TrainerCounters};

use crate::config::Config;
use crate::health::WorkerHealth;
use crate::model::NetworkFactory;
use crate::stats::ActorStats;
use crate::temperature::TemperatureSchedule;
use crate::worker::{SelfPlayWorker, WorkerConfig};

/// Builds a fresh environment for every game.
pub type EnvironmentFactory = Arc<dyn Fn() -> Result<Box<dyn Environment>> + Send + Sync>;

/// Everything a pipeline run needs, already converted to runtime configs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub env_id: String,
    pub num_workers: usize,
    /// Games across all workers, `None` for unlimited
    pub max_games: Option<u64>,
    /// Template for every worker; the worker id is filled in per thread
    pub worker: WorkerConfig,
    pub mcts: MctsConfig,
    pub budget: BudgetConfig,
    pub temperature: TemperatureSchedule,
    pub replay: ReplayConfig,
    pub trainer: TrainerConfig,
    pub max_trainer_restarts: u32,
    /// Checkpoint directory and how many checkpoints to keep
    pub checkpoints: Option<(PathBuf, usize)>,
}

impl PipelineConfig {
    pub fn from_cli(config: &Config) -> Result<Self> {
        let checkpoints = (config.checkpoint_interval > 0).then(|| {
            (
                config.checkpoint_dir(),
                config.central.storage.max_checkpoints,
            )
        });
        Ok(Self {
            env_id: config.env_id.clone(),
            num_workers: config.num_workers,
            max_games: config.max_games(),
            worker: config.worker_config(0),
            mcts: config.mcts_config(),
            budget: config.budget_config(),
            temperature: config.temperature_schedule(),
            replay: config.replay_config()?,
            trainer: config.trainer_config(),
            max_trainer_restarts: config.max_trainer_restarts(),
            checkpoints,
        })
    }

    /// Small, fast pipeline for tests.
    pub fn for_testing(env_id: &str) -> Self {
        Self {
            env_id: env_id.to_string(),
            num_workers: 2,
            max_games: Some(4),
            worker: WorkerConfig::for_testing(),
            mcts: MctsConfig::for_testing().with_simulations(8),
            budget: BudgetConfig::default(),
            temperature: TemperatureSchedule::constant(1.0),
            replay: ReplayConfig::for_testing(),
            trainer: TrainerConfig::for_testing(),
            max_trainer_restarts: 2,
            checkpoints: None,
        }
    }

    pub fn with_workers(mut self, num_workers: usize, max_games: Option<u64>) -> Self {
        self.num_workers = num_workers;
        self.max_games = max_games;
        self
    }

    pub fn with_trainer(mut self, trainer: TrainerConfig, max_restarts: u32) -> Self {
        self.trainer = trainer;
        self.max_trainer_restarts = max_restarts;
        self
    }
}

/// Outcome of one worker thread.
#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub games: u64,
    pub steps: u64,
    /// Why the worker stopped early, if it did
    pub error: Option<String>,
}

/// Outcome of the supervised trainer thread.
#[derive(Debug, Clone, Default)]
pub struct TrainerReport {
    pub steps: u64,
    pub underfill_skips: u64,
    pub failed_steps: u64,
    pub restarts: u64,
    pub last_loss: Option<f32>,
    /// Set when the trainer gave up
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub games: u64,
    pub workers: Vec<WorkerReport>,
    pub trainer: TrainerReport,
    pub final_version: u64,
    pub replay_steps: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
    networks: Arc<dyn NetworkFactory>,
    environments: EnvironmentFactory,
    replay: Arc<ReplayBuffer>,
    storage: Arc<SharedStorage>,
    stats: Option<Arc<ActorStats>>,
    shutdown: Arc<AtomicBool>,
    trainer_counters: Arc<TrainerCounters>,
    health: Vec<WorkerHealth>,
}

impl Pipeline {
    /// Pipeline over registered environments. The replay buffer is created
    /// from `config.replay`.
    pub fn new(
        config: PipelineConfig,
        networks: Arc<dyn NetworkFactory>,
        storage: Arc<SharedStorage>,
    ) -> Self {
        let env_id = config.env_id.clone();
        let environments: EnvironmentFactory = Arc::new(move || {
            create_environment(&env_id).ok_or_else(|| anyhow!("Unknown environment '{}'", env_id))
        });
        let health = (0..config.num_workers).map(WorkerHealth::new).collect();

        Self {
            replay: Arc::new(ReplayBuffer::new(config.replay.clone())),
            config,
            networks,
            environments,
            storage,
            stats: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            trainer_counters: Arc::new(TrainerCounters::default()),
            health,
        }
    }

    pub fn with_replay(mut self, replay: Arc<ReplayBuffer>) -> Self {
        self.replay = replay;
        self
    }

    pub fn with_environment_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Environment>> + Send + Sync + 'static,
    {
        self.environments = Arc::new(factory);
        self
    }

    pub fn with_stats(mut self, stats: Arc<ActorStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn replay(&self) -> Arc<ReplayBuffer> {
        Arc::clone(&self.replay)
    }

    pub fn storage(&self) -> Arc<SharedStorage> {
        Arc::clone(&self.storage)
    }

    /// Setting this flag stops the run.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn trainer_counters(&self) -> Arc<TrainerCounters> {
        Arc::clone(&self.trainer_counters)
    }

    pub fn health(&self) -> &[WorkerHealth] {
        &self.health
    }

    /// Run workers and trainer until the game limit is reached or shutdown
    /// is requested, then stop the trainer.
    pub fn run<O: Optimizer + 'static>(&self, optimizer: O) -> Result<PipelineReport> {
        info!(
            env_id = %self.config.env_id,
            workers = self.config.num_workers,
            max_games = ?self.config.max_games,
            simulations = self.config.mcts.num_simulations,
            "Starting self-play pipeline"
        );

        let mut trainer = Trainer::new(
            self.config.trainer.clone(),
            optimizer,
            Arc::clone(&self.replay),
            Arc::clone(&self.storage),
        )
        .with_counters(Arc::clone(&self.trainer_counters));
        if let Some((dir, max)) = &self.config.checkpoints {
            trainer = trainer.with_checkpoints(CheckpointStore::new(dir, *max));
        }

        let claimed = AtomicU64::new(0);
        let (workers, trainer) = thread::scope(|s| -> Result<_> {
            let trainer_handle = thread::Builder::new()
                .name("trainer".into())
                .spawn_scoped(s, move || self.supervise_trainer(trainer))
                .context("Failed to spawn trainer thread")?;

            let mut handles = Vec::with_capacity(self.config.num_workers);
            let mut spawn_error = None;
            for worker_id in 0..self.config.num_workers {
                let claimed = &claimed;
                match thread::Builder::new()
                    .name(format!("worker-{worker_id}"))
                    .spawn_scoped(s, move || self.run_worker(worker_id, claimed))
                {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        self.shutdown.store(true, Ordering::SeqCst);
                        spawn_error =
                            Some(anyhow!(e).context(format!("Failed to spawn worker {worker_id}")));
                        break;
                    }
                }
            }

            let joined: Vec<_> = handles.into_iter().map(|h| h.join()).collect();

            // Workers are done; nothing new will arrive for the trainer
            self.shutdown.store(true, Ordering::SeqCst);
            let trainer = trainer_handle
                .join()
                .map_err(|_| anyhow!("Trainer thread panicked"))?;
            if let Some(e) = spawn_error {
                return Err(e);
            }
            let workers = joined
                .into_iter()
                .map(|r| r.map_err(|_| anyhow!("Worker thread panicked")))
                .collect::<Result<Vec<_>>>()?;
            Ok((workers, trainer))
        })?;

        let report = PipelineReport {
            games: workers.iter().map(|w| w.games).sum(),
            workers,
            trainer,
            final_version: self.storage.latest_version(),
            replay_steps: self.replay.size(),
        };
        info!(
            games = report.games,
            train_steps = report.trainer.steps,
            restarts = report.trainer.restarts,
            version = report.final_version,
            replay_steps = report.replay_steps,
            "Pipeline finished"
        );
        Ok(report)
    }

    fn run_worker(&self, worker_id: usize, claimed: &AtomicU64) -> WorkerReport {
        let mut worker = SelfPlayWorker::new(
            self.config.worker.clone().with_worker_id(worker_id),
            Arc::clone(&self.replay),
            Arc::clone(&self.storage),
            Arc::clone(&self.networks),
        )
        .with_mcts_config(self.config.mcts.clone())
        .with_budget_config(self.config.budget.clone())
        .with_temperature(self.config.temperature.clone())
        .with_health(self.health[worker_id].clone());
        if let Some(stats) = &self.stats {
            worker = worker.with_stats(Arc::clone(stats));
        }

        let mut report = WorkerReport {
            worker_id,
            ..Default::default()
        };

        while !self.shutdown.load(Ordering::Relaxed) {
            if let Some(max) = self.config.max_games {
                if claimed.fetch_add(1, Ordering::SeqCst) >= max {
                    break;
                }
            }

            let mut env = match (self.environments)() {
                Ok(env) => env,
                Err(e) => {
                    error!(worker = worker_id, error = %e, "Failed to create environment");
                    worker.health().set_unhealthy();
                    report.error = Some(e.to_string());
                    break;
                }
            };

            match worker.play_one_game(env.as_mut()) {
                Ok(summary) => report.steps += summary.steps as u64,
                Err(e) => {
                    error!(worker = worker_id, error = %e, "Worker stopping");
                    report.error = Some(e.to_string());
                    break;
                }
            }
        }

        report.games = worker.games_played();
        info!(
            worker = worker_id,
            games = report.games,
            steps = report.steps,
            "Worker finished"
        );
        report
    }

    fn supervise_trainer<O: Optimizer>(&self, mut trainer: Trainer<O>) -> TrainerReport {
        let mut report = TrainerReport::default();
        let mut restarts = 0u32;

        loop {
            match trainer.run(&self.shutdown) {
                Ok(summary) => {
                    report.last_loss = summary.last_loss.or(report.last_loss);
                    break;
                }
                Err(e) if e.is_contention() && restarts < self.config.max_trainer_restarts => {
                    restarts += 1;
                    self.trainer_counters.restarts.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        restart = restarts,
                        max_restarts = self.config.max_trainer_restarts,
                        error = %e,
                        "Restarting trainer loop"
                    );
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    error!(error = %e, "Trainer failed, shutting down pipeline");
                    report.error = Some(e.to_string());
                    self.shutdown.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }

        report.steps = self.trainer_counters.steps();
        report.underfill_skips = self.trainer_counters.underfill_skips();
        report.failed_steps = self.trainer_counters.failed_steps();
        report.restarts = self.trainer_counters.restarts();
        report
    }
}
