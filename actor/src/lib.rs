//! Mirage self-play actor.
//!
//! - [`worker`]: the self-play worker loop (refresh model, budget, search,
//!   sample, step) and per-game failure handling
//! - [`pipeline`]: N worker threads plus one supervised trainer thread over a
//!   shared replay buffer and shared storage
//! - [`model`]: per-worker model cache and the [`NetworkFactory`] seam
//! - [`temperature`]: action-selection temperature schedule
//! - [`health`], [`stats`], [`metrics`]: health signal, JSON statistics and
//!   Prometheus metrics
//! - [`config`]: CLI flags layered over the central config
//!
//! ```rust
//! use std::sync::Arc;
//! use actor::model::UniformNetworkFactory;
//! use actor::worker::{SelfPlayWorker, WorkerConfig};
//! use mcts::MctsConfig;
//! use model_store::SharedStorage;
//! use replay_buffer::{ReplayBuffer, ReplayConfig};
//!
//! let replay = Arc::new(ReplayBuffer::new(ReplayConfig::for_testing()));
//! let storage = Arc::new(SharedStorage::new(vec![0u8; 4]));
//! let mut worker = SelfPlayWorker::new(
//!     WorkerConfig::for_testing(),
//!     Arc::clone(&replay),
//!     storage,
//!     Arc::new(UniformNetworkFactory::new(2)),
//! )
//! .with_mcts_config(MctsConfig::for_testing().with_simulations(16));
//!
//! let mut env = games_corridor::Corridor::new(3);
//! let summary = worker.play_one_game(&mut env).unwrap();
//! assert_eq!(replay.size(), summary.steps);
//! ```

pub mod config;
pub mod health;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod stats;
pub mod temperature;
pub mod worker;

pub use health::WorkerHealth;
pub use model::{ModelCache, NetworkFactory, UniformNetworkFactory};
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport, TrainerReport, WorkerReport};
pub use stats::{ActorStats, ActorStatsSnapshot};
pub use temperature::TemperatureSchedule;
pub use worker::{GameSummary, SelfPlayWorker, WorkerConfig, WorkerError};
