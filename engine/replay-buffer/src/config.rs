//! Replay buffer configuration.

use std::fmt;
use std::str::FromStr;

/// How sample units are weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityMode {
    /// Every stored step is equally likely.
    Uniform,
    /// Steps are weighted by `|root_value - value_target|^alpha`.
    ValueError,
    /// Newer trajectories are weighted higher, linearly in insertion order.
    Recency,
}

impl PriorityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityMode::Uniform => "uniform",
            PriorityMode::ValueError => "value_error",
            PriorityMode::Recency => "recency",
        }
    }
}

impl fmt::Display for PriorityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uniform" => Ok(PriorityMode::Uniform),
            "value_error" | "error" => Ok(PriorityMode::ValueError),
            "recency" => Ok(PriorityMode::Recency),
            other => Err(format!(
                "Unknown priority mode '{}' (expected uniform, value_error or recency)",
                other
            )),
        }
    }
}

/// Configuration for [`crate::ReplayBuffer`].
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Maximum number of stored steps across all trajectories.
    pub capacity_steps: usize,

    pub priority: PriorityMode,

    /// Exponent applied to raw priorities (0 = uniform).
    pub priority_alpha: f32,

    /// Exponent of the importance-sampling correction (0 = no correction).
    pub priority_beta: f32,

    /// Lookahead of the n-step value target.
    pub td_steps: usize,

    /// Discount of the n-step value target.
    pub discount: f32,

    /// Eviction picks the lowest-priority trajectory among this many of the
    /// oldest. 1 is strict FIFO.
    pub eviction_window: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            capacity_steps: 100_000,
            priority: PriorityMode::ValueError,
            priority_alpha: 1.0,
            priority_beta: 1.0,
            td_steps: 10,
            discount: 0.997,
            eviction_window: 1,
        }
    }
}

impl ReplayConfig {
    /// Small uniform buffer for tests.
    pub fn for_testing() -> Self {
        Self {
            capacity_steps: 1_000,
            priority: PriorityMode::Uniform,
            discount: 1.0,
            ..Default::default()
        }
    }

    pub fn with_capacity(mut self, capacity_steps: usize) -> Self {
        self.capacity_steps = capacity_steps;
        self
    }

    pub fn with_priority(mut self, priority: PriorityMode, alpha: f32, beta: f32) -> Self {
        self.priority = priority;
        self.priority_alpha = alpha;
        self.priority_beta = beta;
        self
    }

    pub fn with_td_steps(mut self, td_steps: usize, discount: f32) -> Self {
        self.td_steps = td_steps;
        self.discount = discount;
        self
    }

    pub fn with_eviction_window(mut self, window: usize) -> Self {
        self.eviction_window = window;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_mode_parse() {
        assert_eq!("uniform".parse::<PriorityMode>(), Ok(PriorityMode::Uniform));
        assert_eq!(
            "Value_Error".parse::<PriorityMode>(),
            Ok(PriorityMode::ValueError)
        );
        assert_eq!("recency".parse::<PriorityMode>(), Ok(PriorityMode::Recency));
        assert!("loss".parse::<PriorityMode>().is_err());
    }

    #[test]
    fn test_priority_mode_display_round_trip() {
        for mode in [
            PriorityMode::Uniform,
            PriorityMode::ValueError,
            PriorityMode::Recency,
        ] {
            assert_eq!(mode.to_string().parse::<PriorityMode>(), Ok(mode));
        }
    }

    #[test]
    fn test_builders() {
        let config = ReplayConfig::for_testing()
            .with_capacity(40)
            .with_priority(PriorityMode::Recency, 0.5, 0.4)
            .with_td_steps(3, 0.9)
            .with_eviction_window(2);

        assert_eq!(config.capacity_steps, 40);
        assert_eq!(config.priority, PriorityMode::Recency);
        assert_eq!(config.td_steps, 3);
        assert_eq!(config.eviction_window, 2);
        assert!((config.priority_beta - 0.4).abs() < 1e-6);
    }
}
