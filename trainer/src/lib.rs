//! Trainer for Mirage
//!
//! The single consumer of the replay buffer. Each step samples a prioritized
//! batch, hands it to an external [`Optimizer`] together with the current
//! weights, writes the optimizer's new priorities back, and publishes the
//! resulting weights to shared storage.
//!
//! ```rust
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! use model_store::SharedStorage;
//! use replay_buffer::{ReplayBuffer, ReplayConfig};
//! use trainer::{PassthroughOptimizer, Trainer, TrainerConfig};
//!
//! let replay = Arc::new(ReplayBuffer::new(ReplayConfig::for_testing()));
//! let storage = Arc::new(SharedStorage::new(vec![0u8; 16]));
//! let mut trainer = Trainer::new(
//!     TrainerConfig::for_testing(),
//!     PassthroughOptimizer::new(),
//!     replay,
//!     storage,
//! );
//!
//! // Nothing to train on yet
//! assert!(trainer.train_step().unwrap_err().is_underfill());
//!
//! let stop = AtomicBool::new(true);
//! assert_eq!(trainer.run(&stop).unwrap().steps, 0);
//! ```

pub mod config;
pub mod optimizer;
pub mod trainer;

pub use config::TrainerConfig;
pub use optimizer::{ModelUpdate, Optimizer, OptimizerError, PassthroughOptimizer};
pub use trainer::{TrainStepSummary, Trainer, TrainerCounters, TrainerError, TrainerRunSummary};
