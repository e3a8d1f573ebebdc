//! Time budget controller.
//!
//! Decides how much search a move may spend. Without a game clock the answer
//! is a fixed simulation count. Against a clock, the remaining time (minus a
//! safety margin) is split over the moves still expected, per-move overhead is
//! taken off, and the rest is converted to simulations using the per-simulation
//! cost. Below a critical clock the controller falls back to a minimal
//! simulation count, still capped by the wall-time limit: once the usable
//! clock is gone a degraded search runs no simulations and plays the root
//! prior.

use std::time::Duration;

use tracing::debug;

/// Smallest per-simulation cost used for affordability.
const MIN_SIMULATION_COST: Duration = Duration::from_micros(1);

/// Configuration for the time budget controller.
#[derive(Debug, Clone)]
pub struct BudgetConfig {
    /// Configured cost of one simulation.
    pub per_simulation_cost: Duration,

    /// Clock held back from search across the rest of the game.
    pub safety_margin: Duration,

    /// Non-search cost of one move (encoding, `represent`, environment step).
    pub move_overhead: Duration,

    /// Below this remaining clock the controller degrades.
    pub critical_threshold: Duration,

    /// Simulation count used when degraded.
    pub min_simulations: u32,

    /// Weight of the newest measurement in the moving average of observed cost.
    pub cost_ema_alpha: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            per_simulation_cost: Duration::from_millis(5),
            safety_margin: Duration::from_millis(500),
            move_overhead: Duration::from_millis(20),
            critical_threshold: Duration::from_secs(2),
            min_simulations: 4,
            cost_ema_alpha: 0.2,
        }
    }
}

impl BudgetConfig {
    pub fn with_per_simulation_cost(mut self, cost: Duration) -> Self {
        self.per_simulation_cost = cost;
        self
    }

    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    pub fn with_move_overhead(mut self, overhead: Duration) -> Self {
        self.move_overhead = overhead;
        self
    }

    pub fn with_critical_threshold(mut self, threshold: Duration) -> Self {
        self.critical_threshold = threshold;
        self
    }

    pub fn with_min_simulations(mut self, n: u32) -> Self {
        self.min_simulations = n;
        self
    }
}

/// Search allowance for one move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    /// Upper bound on simulations.
    pub max_simulations: u32,

    /// Wall-clock limit for the whole search call, if any.
    pub wall_time: Option<Duration>,

    /// The clock forced fewer simulations than the default.
    pub clock_limited: bool,

    /// The clock is below the critical threshold.
    pub degraded: bool,

    /// Expected cost of one simulation. Under a wall-time limit the search
    /// will not start a simulation it expects to overrun.
    pub simulation_cost: Duration,
}

impl Budget {
    /// Fixed simulation count, no clock.
    pub fn simulations(n: u32) -> Self {
        Self {
            max_simulations: n,
            wall_time: None,
            clock_limited: false,
            degraded: false,
            simulation_cost: Duration::ZERO,
        }
    }

    /// Whether moves under this budget are of reduced search quality.
    pub fn is_constrained(&self) -> bool {
        self.clock_limited || self.degraded
    }

    /// Longest this budget can keep the search running at `cost` per simulation.
    pub fn worst_case(&self, cost: Duration) -> Duration {
        let by_count = cost.saturating_mul(self.max_simulations);
        match self.wall_time {
            Some(limit) => by_count.min(limit),
            None => by_count,
        }
    }
}

/// Allocates per-move search budgets and learns the real simulation cost.
#[derive(Debug, Clone)]
pub struct TimeBudgetController {
    config: BudgetConfig,
    measured_cost: Option<Duration>,
}

impl TimeBudgetController {
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            measured_cost: None,
        }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Moving average of observed per-simulation cost, once measured.
    pub fn measured_cost(&self) -> Option<Duration> {
        self.measured_cost
    }

    /// Cost used for affordability: the larger of configured and measured.
    pub fn simulation_cost(&self) -> Duration {
        let configured = self.config.per_simulation_cost;
        let cost = match self.measured_cost {
            Some(measured) => configured.max(measured),
            None => configured,
        };
        cost.max(MIN_SIMULATION_COST)
    }

    /// Budget for the next move.
    pub fn allocate(
        &self,
        remaining_clock: Option<Duration>,
        estimated_moves_left: u32,
        default_simulations: u32,
    ) -> Budget {
        let Some(remaining) = remaining_clock else {
            return Budget::simulations(default_simulations);
        };

        let moves = estimated_moves_left.max(1);
        let usable = remaining.saturating_sub(self.config.safety_margin);
        let search_time = (usable / moves).saturating_sub(self.config.move_overhead);
        let cost = self.simulation_cost();
        let affordable = (search_time.as_nanos() / cost.as_nanos()).min(u32::MAX as u128) as u32;

        let degraded = remaining < self.config.critical_threshold
            || affordable < self.config.min_simulations.min(default_simulations);

        let budget = if degraded {
            Budget {
                max_simulations: self.config.min_simulations.min(default_simulations),
                wall_time: Some(search_time),
                clock_limited: true,
                degraded: true,
                simulation_cost: cost,
            }
        } else {
            Budget {
                max_simulations: affordable.min(default_simulations),
                wall_time: Some(search_time),
                clock_limited: affordable < default_simulations,
                degraded: false,
                simulation_cost: cost,
            }
        };

        debug!(
            remaining_ms = remaining.as_millis() as u64,
            moves_left = moves,
            search_ms = search_time.as_millis() as u64,
            cost_us = cost.as_micros() as u64,
            max_simulations = budget.max_simulations,
            degraded = budget.degraded,
            "Allocated search budget"
        );

        budget
    }

    /// Fold a finished search into the measured per-simulation cost.
    ///
    /// `elapsed` is the time spent in the simulation loop only
    /// ([`SearchResult::simulation_time`](crate::SearchResult)); root
    /// expansion is covered by the move overhead.
    pub fn record_search(&mut self, simulations: u32, elapsed: Duration) {
        if simulations == 0 {
            return;
        }
        let sample = elapsed.as_secs_f64() / simulations as f64;
        let alpha = self.config.cost_ema_alpha.clamp(0.0, 1.0);
        let next = match self.measured_cost {
            Some(prev) => alpha * sample + (1.0 - alpha) * prev.as_secs_f64(),
            None => sample,
        };
        self.measured_cost = Some(Duration::from_secs_f64(next.max(0.0)));
    }
}
