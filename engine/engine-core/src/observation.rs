//! Shaped observation tensors.
//!
//! Observations are kept as a flat `f32` buffer plus an explicit shape so the
//! search core can be parameterized over per-game dimensions instead of
//! hard-coding them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a buffer does not match the shape it is paired with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Shape mismatch: shape {shape:?} needs {expected} values but got {actual}")]
pub struct ShapeError {
    pub shape: Vec<usize>,
    pub expected: usize,
    pub actual: usize,
}

/// An observation produced by an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    data: Vec<f32>,
    shape: Vec<usize>,
}

impl Observation {
    /// Create an observation, checking that `data` fills `shape` exactly.
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Result<Self, ShapeError> {
        let expected = shape.iter().product::<usize>();
        if expected != data.len() {
            return Err(ShapeError {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, shape })
    }

    /// Create a one-dimensional observation.
    pub fn flat(data: Vec<f32>) -> Self {
        let shape = vec![data.len()];
        Self { data, shape }
    }

    /// All-zero observation of the given shape.
    pub fn zeros(shape: &[usize]) -> Self {
        let len = shape.iter().product();
        Self {
            data: vec![0.0; len],
            shape: shape.to_vec(),
        }
    }

    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check this observation against the shape a game advertises.
    pub fn ensure_shape(&self, expected: &[usize]) -> Result<(), ShapeError> {
        if self.shape != expected {
            return Err(ShapeError {
                shape: expected.to_vec(),
                expected: expected.iter().product(),
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}
