//! Running value bounds for Q normalization.
//!
//! Learned values and rewards are not confined to [-1, 1], so Q values are
//! rescaled into [0, 1] using the smallest and largest backed-up values seen
//! in the current tree.

#[derive(Debug, Clone)]
pub struct MinMaxStats {
    minimum: f32,
    maximum: f32,
}

impl Default for MinMaxStats {
    fn default() -> Self {
        Self {
            minimum: f32::INFINITY,
            maximum: f32::NEG_INFINITY,
        }
    }
}

impl MinMaxStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: f32) {
        self.minimum = self.minimum.min(value);
        self.maximum = self.maximum.max(value);
    }

    /// Whether two distinct values have been seen.
    pub fn has_bounds(&self) -> bool {
        self.maximum > self.minimum
    }

    /// Map `value` into [0, 1]; unchanged until bounds are known.
    pub fn normalize(&self, value: f32) -> f32 {
        if self.has_bounds() {
            (value - self.minimum) / (self.maximum - self.minimum)
        } else {
            value
        }
    }
}
