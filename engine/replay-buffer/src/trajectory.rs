//! Self-play trajectories.
//!
//! A trajectory is the full record of one game as seen by the search: the
//! observation at each decision point, the action taken, the visit
//! distribution the search produced, the reward the mover received and the
//! root value estimate. Once handed to the replay buffer it is shared behind
//! an `Arc` and never mutated again.

use engine_core::{ActionId, Observation, PlayerId};
use serde::{Deserialize, Serialize};

/// Why a game stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// The environment reported the game as done.
    Normal,
    /// A safety limit (step cap or per-game timeout) ended the game.
    ForcedDone,
    /// The real-time game clock ran out.
    ClockExhausted,
    /// The environment failed mid-game (illegal action, protocol error, timeout).
    EnvironmentFailure(String),
    /// A network capability call failed mid-game.
    ModelFailure(String),
}

impl TerminationReason {
    /// Whether the trajectory stops before the game reached a natural end.
    pub fn is_partial(&self) -> bool {
        !matches!(self, TerminationReason::Normal)
    }

    /// Short label used for statistics and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Normal => "normal",
            TerminationReason::ForcedDone => "forced_done",
            TerminationReason::ClockExhausted => "clock_exhausted",
            TerminationReason::EnvironmentFailure(_) => "environment_failure",
            TerminationReason::ModelFailure(_) => "model_failure",
        }
    }
}

/// One decision point of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStep {
    /// Observation the search was rooted at.
    pub observation: Observation,

    /// Action applied to the environment.
    pub action: ActionId,

    /// Root visit proportions, dense over the action space.
    pub search_policy: Vec<f32>,

    /// Reward the mover received for `action`.
    pub reward: f32,

    /// Root value estimate, from the mover's perspective.
    pub root_value: f32,

    /// Player who chose `action`.
    pub to_play: PlayerId,

    /// The time budget cut this move's search short.
    pub budget_exhausted: bool,

    /// Simulations the search completed for this move.
    pub simulations: u32,
}

/// A complete (or partial) self-play game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub env_id: String,
    pub game_id: String,
    pub worker_id: usize,

    /// Model version used for the first move.
    pub model_version: u64,

    pub steps: Vec<TrajectoryStep>,

    /// The environment reported the game as done.
    pub terminal: bool,

    /// Reward delivered by the final step (0 for an empty trajectory).
    pub outcome: f32,

    pub termination: TerminationReason,
}

impl Trajectory {
    /// Start an empty trajectory. It is `Normal` and non-terminal until finished.
    pub fn new(
        env_id: impl Into<String>,
        game_id: impl Into<String>,
        worker_id: usize,
        model_version: u64,
    ) -> Self {
        Self {
            env_id: env_id.into(),
            game_id: game_id.into(),
            worker_id,
            model_version,
            steps: Vec::new(),
            terminal: false,
            outcome: 0.0,
            termination: TerminationReason::Normal,
        }
    }

    pub fn push_step(&mut self, step: TrajectoryStep) {
        self.steps.push(step);
    }

    /// Record how the game ended.
    pub fn finish(&mut self, termination: TerminationReason, terminal: bool) {
        self.outcome = self.steps.last().map(|s| s.reward).unwrap_or(0.0);
        self.termination = termination;
        self.terminal = terminal;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of moves whose search was cut short by the time budget.
    pub fn budget_exhausted_moves(&self) -> usize {
        self.steps.iter().filter(|s| s.budget_exhausted).count()
    }

    /// Total simulations across all moves.
    pub fn total_simulations(&self) -> u64 {
        self.steps.iter().map(|s| s.simulations as u64).sum()
    }

    /// n-step value target for the step at `index`, from that step's mover's
    /// perspective.
    ///
    /// Sums the next `td_steps` discounted rewards and bootstraps from the
    /// stored root value `td_steps` moves later. Rewards and root values of
    /// another player are negated. Past the end of the trajectory there is
    /// nothing to bootstrap from and the tail contributes zero.
    pub fn value_target(&self, index: usize, td_steps: usize, discount: f32) -> f32 {
        let Some(origin) = self.steps.get(index) else {
            return 0.0;
        };
        let sign = |step: &TrajectoryStep| {
            if step.to_play == origin.to_play {
                1.0
            } else {
                -1.0
            }
        };

        let bootstrap_index = index.saturating_add(td_steps);
        let mut value = match self.steps.get(bootstrap_index) {
            Some(step) => sign(step) * step.root_value * discount.powi(td_steps as i32),
            None => 0.0,
        };

        let end = bootstrap_index.min(self.steps.len());
        for (i, step) in self.steps[index..end].iter().enumerate() {
            value += sign(step) * step.reward * discount.powi(i as i32);
        }
        value
    }
}
