//! Replay buffer for Mirage self-play.
//!
//! Self-play workers push finished [`Trajectory`] records; the trainer samples
//! individual steps from them with probability proportional to a priority and
//! receives an importance-sampling weight with each one.
//!
//! ```rust
//! use engine_core::Observation;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha20Rng;
//! use replay_buffer::{ReplayBuffer, ReplayConfig, TerminationReason, Trajectory, TrajectoryStep};
//!
//! let buffer = ReplayBuffer::new(ReplayConfig::for_testing().with_capacity(40));
//!
//! let mut trajectory = Trajectory::new("corridor", "worker-0-ep-1", 0, 1);
//! for _ in 0..3 {
//!     trajectory.push_step(TrajectoryStep {
//!         observation: Observation::flat(vec![0.0; 4]),
//!         action: 1,
//!         search_policy: vec![0.25, 0.75],
//!         reward: 0.0,
//!         root_value: 0.0,
//!         to_play: 0,
//!         budget_exhausted: false,
//!         simulations: 50,
//!     });
//! }
//! trajectory.finish(TerminationReason::Normal, true);
//! buffer.push(trajectory).unwrap();
//! assert_eq!(buffer.size(), 3);
//!
//! let mut rng = ChaCha20Rng::seed_from_u64(0);
//! let batch = buffer.sample(8, &mut rng).unwrap();
//! assert_eq!(batch.len(), 8);
//! ```

pub mod buffer;
pub mod config;
pub mod trajectory;

pub use buffer::{
    ReplayBuffer, ReplayError, ReplayStats, RetainedTrajectory, SampleKey, SampledStep,
};
pub use config::{PriorityMode, ReplayConfig};
pub use trajectory::{TerminationReason, Trajectory, TrajectoryStep};

#[cfg(test)]
mod tests;
