//! Learned model capability consumed by the search.
//!
//! The search never touches the real environment below the root. It asks a
//! [`Network`] for three things: a hidden state for the root observation
//! (`represent`), a successor hidden state and reward for an action
//! (`dynamics`), and a policy/value estimate for a hidden state (`predict`).
//! Architecture, losses and weights live behind this trait.

use std::sync::Arc;

use engine_core::{ActionId, Observation};
use thiserror::Error;

/// Errors raised by (or about) a network capability call.
///
/// Any of these is fatal to the current move.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelInterfaceError {
    #[error("{function} call failed: {message}")]
    CallFailed {
        function: &'static str,
        message: String,
    },

    #[error("Malformed {what}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Non-finite {what} returned by the network")]
    NonFinite { what: &'static str },

    #[error("Policy has no usable probability mass over the candidate actions")]
    DegeneratePolicy,
}

impl ModelInterfaceError {
    pub fn call_failed(function: &'static str, message: impl Into<String>) -> Self {
        Self::CallFailed {
            function,
            message: message.into(),
        }
    }
}

/// Opaque latent state produced by `represent` or `dynamics`.
///
/// Immutable once created; clones share the same buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenState(Arc<[f32]>);

impl HiddenState {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values.into())
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

/// Output of `predict`.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Probability per action, indexed by action id over the full action space.
    pub policy: Vec<f32>,

    /// Value estimate from the perspective of the player to move.
    pub value: f32,
}

/// The three learned functions the search runs on.
pub trait Network: Send + Sync {
    /// Size of the action space the policy head covers.
    fn action_space_size(&self) -> usize;

    fn represent(&self, observation: &Observation) -> Result<HiddenState, ModelInterfaceError>;

    /// Successor hidden state plus the reward for the player who took `action`.
    fn dynamics(
        &self,
        state: &HiddenState,
        action: ActionId,
    ) -> Result<(HiddenState, f32), ModelInterfaceError>;

    fn predict(&self, state: &HiddenState) -> Result<Prediction, ModelInterfaceError>;
}

impl<N: Network + ?Sized> Network for Arc<N> {
    fn action_space_size(&self) -> usize {
        (**self).action_space_size()
    }

    fn represent(&self, observation: &Observation) -> Result<HiddenState, ModelInterfaceError> {
        (**self).represent(observation)
    }

    fn dynamics(
        &self,
        state: &HiddenState,
        action: ActionId,
    ) -> Result<(HiddenState, f32), ModelInterfaceError> {
        (**self).dynamics(state, action)
    }

    fn predict(&self, state: &HiddenState) -> Result<Prediction, ModelInterfaceError> {
        (**self).predict(state)
    }
}

/// Network with a uniform policy and a neutral value.
///
/// Hidden states are the observation itself; `dynamics` is the identity with
/// zero reward. Useful for testing the search and for running the pipeline
/// before a learned model is plugged in.
#[derive(Debug, Clone)]
pub struct UniformNetwork {
    num_actions: usize,
}

impl UniformNetwork {
    pub fn new(num_actions: usize) -> Self {
        Self { num_actions }
    }
}

impl Network for UniformNetwork {
    fn action_space_size(&self) -> usize {
        self.num_actions
    }

    fn represent(&self, observation: &Observation) -> Result<HiddenState, ModelInterfaceError> {
        Ok(HiddenState::new(observation.data().to_vec()))
    }

    fn dynamics(
        &self,
        state: &HiddenState,
        _action: ActionId,
    ) -> Result<(HiddenState, f32), ModelInterfaceError> {
        Ok((state.clone(), 0.0))
    }

    fn predict(&self, _state: &HiddenState) -> Result<Prediction, ModelInterfaceError> {
        if self.num_actions == 0 {
            return Err(ModelInterfaceError::DegeneratePolicy);
        }
        let p = 1.0 / self.num_actions as f32;
        Ok(Prediction {
            policy: vec![p; self.num_actions],
            value: 0.0,
        })
    }
}

/// Check a prediction against the action space before it enters the tree.
pub(crate) fn validate_prediction(
    prediction: &Prediction,
    num_actions: usize,
) -> Result<(), ModelInterfaceError> {
    if prediction.policy.len() != num_actions {
        return Err(ModelInterfaceError::ShapeMismatch {
            what: "policy",
            expected: num_actions,
            actual: prediction.policy.len(),
        });
    }
    if !prediction.value.is_finite() {
        return Err(ModelInterfaceError::NonFinite { what: "value" });
    }
    if prediction.policy.iter().any(|p| !p.is_finite()) {
        return Err(ModelInterfaceError::NonFinite { what: "policy" });
    }
    Ok(())
}

/// Renormalize `policy` over `actions`.
///
/// Negative entries count as zero. Fails if the candidate set carries no mass.
pub(crate) fn masked_priors(
    policy: &[f32],
    actions: &[ActionId],
) -> Result<Vec<f32>, ModelInterfaceError> {
    let raw: Vec<f32> = actions
        .iter()
        .map(|&a| policy[a as usize].max(0.0))
        .collect();
    let total: f32 = raw.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(ModelInterfaceError::DegeneratePolicy);
    }
    Ok(raw.into_iter().map(|p| p / total).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_network() {
        let net = UniformNetwork::new(4);
        let obs = Observation::flat(vec![1.0, 2.0]);

        let h = net.represent(&obs).unwrap();
        assert_eq!(h.as_slice(), &[1.0, 2.0]);

        let (next, reward) = net.dynamics(&h, 3).unwrap();
        assert_eq!(next, h);
        assert!(reward.abs() < 1e-6);

        let pred = net.predict(&next).unwrap();
        assert_eq!(pred.policy.len(), 4);
        for p in &pred.policy {
            assert!((p - 0.25).abs() < 1e-6);
        }
        assert!(pred.value.abs() < 1e-6);
    }

    #[test]
    fn test_validate_prediction_shape() {
        let pred = Prediction {
            policy: vec![0.5, 0.5],
            value: 0.0,
        };
        assert!(validate_prediction(&pred, 2).is_ok());
        assert_eq!(
            validate_prediction(&pred, 3),
            Err(ModelInterfaceError::ShapeMismatch {
                what: "policy",
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_validate_prediction_non_finite() {
        let pred = Prediction {
            policy: vec![0.5, f32::NAN],
            value: 0.0,
        };
        assert_eq!(
            validate_prediction(&pred, 2),
            Err(ModelInterfaceError::NonFinite { what: "policy" })
        );

        let pred = Prediction {
            policy: vec![0.5, 0.5],
            value: f32::INFINITY,
        };
        assert_eq!(
            validate_prediction(&pred, 2),
            Err(ModelInterfaceError::NonFinite { what: "value" })
        );
    }

    #[test]
    fn test_masked_priors() {
        let priors = masked_priors(&[0.1, 0.2, 0.3, 0.4], &[1, 3]).unwrap();
        assert!((priors[0] - 0.2 / 0.6).abs() < 1e-6);
        assert!((priors[1] - 0.4 / 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_masked_priors_without_mass() {
        assert_eq!(
            masked_priors(&[0.0, 1.0, 0.0], &[0, 2]),
            Err(ModelInterfaceError::DegeneratePolicy)
        );
    }
}
