use std::time::Duration;

/// Trainer loop settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    /// Steps sampled per training step
    pub batch_size: usize,

    /// Stop once this many training steps exist (0 = run until stopped)
    pub max_steps: u64,

    /// Replay steps required before training starts
    pub min_fill: usize,

    /// Longest wait for the buffer to reach `min_fill`
    pub fill_timeout: Duration,

    /// Pause after an under-filled attempt
    pub underfill_backoff: Duration,

    /// Pause after a failed step
    pub failure_backoff: Duration,

    /// Failed steps in a row before `run` gives up (0 = never)
    pub max_consecutive_failures: u32,

    /// Save a checkpoint every this many steps (0 = never)
    pub checkpoint_interval: u64,

    /// Log a progress line every this many steps (0 = never)
    pub log_interval: u64,

    /// Seed for batch sampling
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            batch_size: 128,
            max_steps: 0,
            min_fill: 256,
            fill_timeout: Duration::from_secs(30),
            underfill_backoff: Duration::from_millis(500),
            failure_backoff: Duration::from_millis(500),
            max_consecutive_failures: 20,
            checkpoint_interval: 1000,
            log_interval: 100,
            seed: 0,
        }
    }
}

impl TrainerConfig {
    /// Small batches and short waits for unit tests
    pub fn for_testing() -> Self {
        Self {
            batch_size: 4,
            min_fill: 4,
            fill_timeout: Duration::from_millis(20),
            underfill_backoff: Duration::from_millis(1),
            failure_backoff: Duration::from_millis(1),
            checkpoint_interval: 0,
            log_interval: 0,
            ..Default::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_min_fill(mut self, min_fill: usize, timeout: Duration) -> Self {
        self.min_fill = min_fill;
        self.fill_timeout = timeout;
        self
    }

    pub fn with_failure_limit(mut self, max_consecutive: u32, backoff: Duration) -> Self {
        self.max_consecutive_failures = max_consecutive;
        self.failure_backoff = backoff;
        self
    }

    pub fn with_checkpoint_interval(mut self, interval: u64) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Training may start once this many steps are stored.
    pub fn required_fill(&self) -> usize {
        self.min_fill.max(self.batch_size).max(1)
    }
}
