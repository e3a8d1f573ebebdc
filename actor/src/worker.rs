//! Self-play worker.
//!
//! A [`SelfPlayWorker`] plays one game at a time against an [`Environment`]:
//! per move it refreshes its model, asks the time budget controller for a
//! budget, runs the search and samples a move at the scheduled temperature.
//! Finished games are pushed to the replay buffer.
//!
//! Per-game failures never escape [`SelfPlayWorker::play_one_game`]: an
//! environment or model failure ends the game with a partial trajectory.
//! Only a run of consecutive environment failures (or a broken replay
//! buffer) is reported to the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use engine_core::{Environment, Observation};
use mcts::{
    run_mcts, select_action, BudgetConfig, MctsConfig, TimeBudgetController, TurnModel,
};
use model_store::SharedStorage;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use replay_buffer::{ReplayBuffer, ReplayError, TerminationReason, Trajectory, TrajectoryStep};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::health::WorkerHealth;
use crate::metrics;
use crate::model::{ModelCache, NetworkFactory};
use crate::stats::ActorStats;
use crate::temperature::TemperatureSchedule;

/// Errors that stop a worker. Per-game failures are not among them.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Worker {worker_id} unhealthy after {count} consecutive environment failures (last: {last})")]
    Unhealthy {
        worker_id: usize,
        count: u32,
        last: String,
    },

    #[error("Failed to store trajectory: {0}")]
    Replay(#[from] ReplayError),
}

/// Per-worker settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: usize,
    pub actor_id: String,
    /// Wall-clock limit per game (zero disables it)
    pub episode_timeout: Duration,
    /// Move limit per game (zero disables it)
    pub max_episode_steps: u32,
    /// Consecutive environment failures before the worker gives up (zero never)
    pub max_consecutive_env_failures: u32,
    /// Moves-left estimate handed to the budget controller on every move
    pub estimated_moves: u32,
    /// Log a summary every N games (zero disables it)
    pub log_interval: u32,
    /// 0 seeds from entropy; otherwise the worker uses `seed + worker_id`
    pub seed: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: 0,
            actor_id: "actor".into(),
            episode_timeout: Duration::from_secs(600),
            max_episode_steps: 1000,
            max_consecutive_env_failures: 5,
            estimated_moves: 20,
            log_interval: 50,
            seed: 0,
        }
    }
}

impl WorkerConfig {
    /// Fast, deterministic settings for tests.
    pub fn for_testing() -> Self {
        Self {
            episode_timeout: Duration::from_secs(30),
            max_episode_steps: 500,
            max_consecutive_env_failures: 3,
            estimated_moves: 10,
            log_interval: 0,
            seed: 42,
            ..Self::default()
        }
    }

    pub fn with_worker_id(mut self, worker_id: usize) -> Self {
        self.worker_id = worker_id;
        self
    }

    pub fn with_episode_limits(mut self, timeout: Duration, max_steps: u32) -> Self {
        self.episode_timeout = timeout;
        self.max_episode_steps = max_steps;
        self
    }

    pub fn with_max_env_failures(mut self, count: u32) -> Self {
        self.max_consecutive_env_failures = count;
        self
    }

    pub fn with_estimated_moves(mut self, moves: u32) -> Self {
        self.estimated_moves = moves;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// What happened in one game.
#[derive(Debug, Clone)]
pub struct GameSummary {
    pub game_id: String,
    pub worker_id: usize,
    pub steps: usize,
    pub outcome: f32,
    pub termination: TerminationReason,
    pub terminal: bool,
    pub model_version: u64,
    pub budget_exhausted_moves: usize,
    pub simulations: u64,
    /// The trajectory went into the replay buffer
    pub pushed: bool,
    pub duration: Duration,
}

pub struct SelfPlayWorker {
    config: WorkerConfig,
    mcts: MctsConfig,
    temperature: TemperatureSchedule,
    budget: TimeBudgetController,
    models: ModelCache,
    replay: Arc<ReplayBuffer>,
    storage: Arc<SharedStorage>,
    health: WorkerHealth,
    stats: Option<Arc<ActorStats>>,
    rng: ChaCha20Rng,
    games_played: u64,
}

impl SelfPlayWorker {
    pub fn new(
        config: WorkerConfig,
        replay: Arc<ReplayBuffer>,
        storage: Arc<SharedStorage>,
        factory: Arc<dyn NetworkFactory>,
    ) -> Self {
        let rng = if config.seed == 0 {
            ChaCha20Rng::from_entropy()
        } else {
            ChaCha20Rng::seed_from_u64(config.seed.wrapping_add(config.worker_id as u64))
        };

        Self {
            health: WorkerHealth::new(config.worker_id),
            models: ModelCache::new(Arc::clone(&storage), factory),
            mcts: MctsConfig::for_training(),
            temperature: TemperatureSchedule::default(),
            budget: TimeBudgetController::new(BudgetConfig::default()),
            config,
            replay,
            storage,
            stats: None,
            rng,
            games_played: 0,
        }
    }

    pub fn with_mcts_config(mut self, mcts: MctsConfig) -> Self {
        self.mcts = mcts;
        self
    }

    pub fn with_budget_config(mut self, budget: BudgetConfig) -> Self {
        self.budget = TimeBudgetController::new(budget);
        self
    }

    pub fn with_temperature(mut self, temperature: TemperatureSchedule) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_stats(mut self, stats: Arc<ActorStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Share an externally observed health handle.
    pub fn with_health(mut self, health: WorkerHealth) -> Self {
        self.health = health;
        self
    }

    pub fn worker_id(&self) -> usize {
        self.config.worker_id
    }

    pub fn health(&self) -> &WorkerHealth {
        &self.health
    }

    pub fn games_played(&self) -> u64 {
        self.games_played
    }

    pub fn models(&self) -> &ModelCache {
        &self.models
    }

    /// Play one game, store it and update statistics and health.
    ///
    /// The environment is closed afterwards.
    pub fn play_one_game(
        &mut self,
        env: &mut dyn Environment,
    ) -> Result<GameSummary, WorkerError> {
        let start = Instant::now();
        let trajectory = self.play_game(env);
        env.close();
        self.games_played += 1;

        let mut summary = GameSummary {
            game_id: trajectory.game_id.clone(),
            worker_id: self.config.worker_id,
            steps: trajectory.len(),
            outcome: trajectory.outcome,
            termination: trajectory.termination.clone(),
            terminal: trajectory.terminal,
            model_version: trajectory.model_version,
            budget_exhausted_moves: trajectory.budget_exhausted_moves(),
            simulations: trajectory.total_simulations(),
            pushed: false,
            duration: start.elapsed(),
        };

        if trajectory.is_empty() {
            debug!(
                worker = self.config.worker_id,
                game_id = %summary.game_id,
                reason = summary.termination.as_str(),
                "Game ended before its first move, not stored"
            );
        } else {
            self.storage.record_game(trajectory.outcome, trajectory.len());
            self.replay.push(trajectory)?;
            summary.pushed = true;
        }

        if let Some(stats) = &self.stats {
            stats.record_game(&summary);
        }
        metrics::record_game(&summary);
        self.log_game(&summary);

        if let TerminationReason::EnvironmentFailure(message) = &summary.termination {
            let count = self.health.record_env_failure();
            let limit = self.config.max_consecutive_env_failures;
            if limit > 0 && count >= limit {
                self.health.set_unhealthy();
                return Err(WorkerError::Unhealthy {
                    worker_id: self.config.worker_id,
                    count,
                    last: message.clone(),
                });
            }
        } else {
            self.health.reset_env_failures();
        }
        self.health.record_game_complete();

        Ok(summary)
    }

    /// Play one game to completion or failure and return its trajectory.
    ///
    /// Moves are strictly sequential: the search for a move starts only
    /// after the previous environment step has returned.
    pub fn play_game(&mut self, env: &mut dyn Environment) -> Trajectory {
        let metadata = env.metadata();
        let game_id = format!(
            "{}-w{}-g{}",
            self.config.actor_id,
            self.config.worker_id,
            self.games_played + 1
        );
        let mut trajectory = Trajectory::new(
            metadata.env_id.as_str(),
            game_id,
            self.config.worker_id,
            self.storage.latest_version(),
        );
        let search_config = self
            .mcts
            .clone()
            .with_turn_model(TurnModel::for_players(metadata.player_count));
        let start = Instant::now();

        let mut observation: Observation = match env.reset() {
            Ok(obs) => obs,
            Err(e) => {
                warn!(worker = self.config.worker_id, error = %e, "Environment reset failed");
                trajectory.finish(TerminationReason::EnvironmentFailure(e.to_string()), false);
                return trajectory;
            }
        };
        self.health.set_ready();

        debug!(
            worker = self.config.worker_id,
            game_id = %trajectory.game_id,
            env_id = %metadata.env_id,
            "Starting game"
        );

        let mut move_number: u32 = 0;
        loop {
            if let Some(reason) = self.check_limits(start, move_number) {
                trajectory.finish(reason, false);
                break;
            }

            let legal = env.legal_actions();
            if legal.is_empty() {
                trajectory.finish(
                    TerminationReason::EnvironmentFailure(
                        "no legal actions in a non-terminal state".into(),
                    ),
                    false,
                );
                break;
            }

            // Refresh between moves only, never mid-search
            let network = match self.models.refresh() {
                Ok(network) => network,
                Err(e) => {
                    warn!(worker = self.config.worker_id, error = %e, "Model load failed");
                    trajectory.finish(TerminationReason::ModelFailure(e.to_string()), false);
                    break;
                }
            };
            if move_number == 0 {
                trajectory.model_version = self.models.version().unwrap_or_default();
            }

            let remaining_clock = env.remaining_clock();
            if remaining_clock.is_some_and(|clock| clock.is_zero()) {
                trajectory.finish(TerminationReason::ClockExhausted, false);
                break;
            }

            let budget = self.budget.allocate(
                remaining_clock,
                self.config.estimated_moves,
                search_config.num_simulations,
            );
            let to_play = env.to_play();
            let result = match run_mcts(
                &*network,
                search_config.clone(),
                &observation,
                to_play,
                &legal,
                &budget,
                &mut self.rng,
            ) {
                Ok(result) => result,
                Err(e) => {
                    warn!(worker = self.config.worker_id, error = %e, "Search failed");
                    trajectory.finish(TerminationReason::ModelFailure(e.to_string()), false);
                    break;
                }
            };
            self.budget.record_search(result.simulations, result.simulation_time);
            metrics::record_search(result.simulations, result.elapsed, result.budget_exhausted);

            let temperature = self
                .temperature
                .temperature(self.models.training_step(), move_number);
            let action = match select_action(&result.policy, temperature, &mut self.rng) {
                Ok(action) => action,
                Err(e) => {
                    trajectory.finish(TerminationReason::ModelFailure(e.to_string()), false);
                    break;
                }
            };

            let step = match env.step(action) {
                Ok(step) => step,
                Err(e) => {
                    warn!(
                        worker = self.config.worker_id,
                        game_id = %trajectory.game_id,
                        move_number,
                        error = %e,
                        "Environment failed mid-game"
                    );
                    trajectory.finish(TerminationReason::EnvironmentFailure(e.to_string()), false);
                    break;
                }
            };

            trajectory.push_step(TrajectoryStep {
                observation: std::mem::replace(&mut observation, step.observation),
                action,
                search_policy: result.policy,
                reward: step.reward,
                root_value: result.root_value,
                to_play,
                budget_exhausted: result.budget_exhausted,
                simulations: result.simulations,
            });
            move_number += 1;

            if step.done {
                trajectory.finish(TerminationReason::Normal, true);
                break;
            }
        }

        trajectory
    }

    fn check_limits(&self, start: Instant, move_number: u32) -> Option<TerminationReason> {
        let timeout = self.config.episode_timeout;
        if !timeout.is_zero() && start.elapsed() > timeout {
            warn!(
                worker = self.config.worker_id,
                elapsed_ms = start.elapsed().as_millis() as u64,
                move_number,
                "Game timed out"
            );
            return Some(TerminationReason::ForcedDone);
        }

        let max_steps = self.config.max_episode_steps;
        if max_steps > 0 && move_number >= max_steps {
            warn!(
                worker = self.config.worker_id,
                max_steps, "Game exceeded max steps without terminating"
            );
            return Some(TerminationReason::ForcedDone);
        }

        None
    }

    fn log_game(&self, summary: &GameSummary) {
        let interval = self.config.log_interval as u64;
        if interval > 0 && self.games_played % interval == 0 {
            info!(
                worker = summary.worker_id,
                games = self.games_played,
                steps = summary.steps,
                outcome = summary.outcome,
                reason = summary.termination.as_str(),
                model_version = summary.model_version,
                duration_ms = summary.duration.as_millis() as u64,
                "Self-play progress"
            );
        } else {
            debug!(
                worker = summary.worker_id,
                game_id = %summary.game_id,
                steps = summary.steps,
                reason = summary.termination.as_str(),
                "Game finished"
            );
        }
    }
}
