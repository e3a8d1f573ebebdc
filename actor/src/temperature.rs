//! Action-selection temperature schedule.

/// Temperature for sampling a move from the search policy.
///
/// Two annealing axes apply. Across training, the base temperature halves at
/// each training-step threshold in `decay_steps`. Within a game, moves at or
/// beyond `move_threshold` use `late_temperature` instead (0 disables that
/// switch). A temperature of 0 means greedy play.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureSchedule {
    pub base: f32,
    pub decay_steps: Vec<u64>,
    pub move_threshold: u32,
    pub late_temperature: f32,
}

impl Default for TemperatureSchedule {
    fn default() -> Self {
        Self {
            base: 1.0,
            decay_steps: vec![50_000, 75_000],
            move_threshold: 30,
            late_temperature: 0.0,
        }
    }
}

impl TemperatureSchedule {
    /// Same temperature for every move.
    pub fn constant(temperature: f32) -> Self {
        Self {
            base: temperature,
            decay_steps: Vec::new(),
            move_threshold: 0,
            late_temperature: temperature,
        }
    }

    pub fn greedy() -> Self {
        Self::constant(0.0)
    }

    pub fn with_decay_steps(mut self, steps: Vec<u64>) -> Self {
        self.decay_steps = steps;
        self
    }

    pub fn with_move_threshold(mut self, threshold: u32, late_temperature: f32) -> Self {
        self.move_threshold = threshold;
        self.late_temperature = late_temperature;
        self
    }

    pub fn temperature(&self, training_step: u64, move_number: u32) -> f32 {
        if self.move_threshold > 0 && move_number >= self.move_threshold {
            return self.late_temperature.max(0.0);
        }
        let passed = self
            .decay_steps
            .iter()
            .filter(|&&step| training_step >= step)
            .count();
        (self.base * 0.5f32.powi(passed as i32)).max(0.0)
    }
}

impl From<&engine_config::MctsConfig> for TemperatureSchedule {
    fn from(config: &engine_config::MctsConfig) -> Self {
        Self {
            base: config.temperature as f32,
            decay_steps: config.temperature_decay_steps.clone(),
            move_threshold: config.temp_threshold,
            late_temperature: config.late_temperature as f32,
        }
    }
}
