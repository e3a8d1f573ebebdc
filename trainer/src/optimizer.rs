//! The optimizer capability the trainer drives.
//!
//! Losses, gradients and network architecture live outside Mirage. An
//! [`Optimizer`] receives the current weights blob and a sampled batch and
//! hands back new weights.

use replay_buffer::SampledStep;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizerError {
    /// The batch cannot be trained on. The trainer skips the step.
    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    #[error("Optimizer returned {got} priorities for a batch of {expected}")]
    PriorityMismatch { expected: usize, got: usize },

    #[error("Optimizer failed: {0}")]
    Failed(String),
}

/// Result of one optimizer update.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelUpdate {
    pub weights: Vec<u8>,
    pub loss: f32,
    /// New absolute value errors, one per batch entry in batch order. Empty
    /// leaves replay priorities untouched.
    pub new_priorities: Vec<f32>,
}

/// External optimizer. One instance is owned by the single trainer thread.
pub trait Optimizer: Send {
    fn update(&mut self, weights: &[u8], batch: &[SampledStep])
        -> Result<ModelUpdate, OptimizerError>;
}

/// Stand-in optimizer that leaves weights unchanged.
///
/// Reports the importance-weighted squared error between stored root values
/// and their n-step targets as the loss, and the absolute errors as new
/// priorities. Useful to run the pipeline end to end without a real network.
#[derive(Debug, Default, Clone)]
pub struct PassthroughOptimizer {
    updates: u64,
}

impl PassthroughOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }
}

impl Optimizer for PassthroughOptimizer {
    fn update(
        &mut self,
        weights: &[u8],
        batch: &[SampledStep],
    ) -> Result<ModelUpdate, OptimizerError> {
        if batch.is_empty() {
            return Err(OptimizerError::MalformedBatch("empty batch".to_string()));
        }

        let mut loss = 0.0f32;
        let mut priorities = Vec::with_capacity(batch.len());
        for sample in batch {
            let step = sample.step();
            if step.search_policy.is_empty() {
                return Err(OptimizerError::MalformedBatch(format!(
                    "step {} of game {} has no search policy",
                    sample.key.position, sample.trajectory.game_id
                )));
            }
            let error = step.root_value - sample.value_target;
            if !error.is_finite() {
                return Err(OptimizerError::MalformedBatch(format!(
                    "non-finite value error in game {}",
                    sample.trajectory.game_id
                )));
            }
            loss += sample.importance_weight * error * error;
            priorities.push(error.abs());
        }

        self.updates += 1;
        Ok(ModelUpdate {
            weights: weights.to_vec(),
            loss: loss / batch.len() as f32,
            new_priorities: priorities,
        })
    }
}
