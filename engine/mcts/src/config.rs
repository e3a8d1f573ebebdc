//! MCTS configuration parameters.

use engine_core::PlayerId;

/// How the player to move changes from a node to its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnModel {
    /// One player acts at every node.
    Single,
    /// Players take turns in order `0, 1, .., players - 1, 0, ..`.
    Alternating { players: u32 },
}

impl TurnModel {
    /// Turn model for a game with `player_count` players.
    pub fn for_players(player_count: usize) -> Self {
        if player_count <= 1 {
            TurnModel::Single
        } else {
            TurnModel::Alternating {
                players: player_count as u32,
            }
        }
    }

    /// Player to move after `to_play` acts.
    #[inline]
    pub fn next(self, to_play: PlayerId) -> PlayerId {
        match self {
            TurnModel::Single => to_play,
            TurnModel::Alternating { players } => (to_play + 1) % players.max(1),
        }
    }
}

/// Configuration for Monte Carlo Tree Search.
#[derive(Debug, Clone)]
pub struct MctsConfig {
    /// Number of simulations to run per search when no time budget applies.
    pub num_simulations: u32,

    /// Exploration constant for the PUCT formula.
    /// Used as-is when `pb_c_base` is 0.
    pub c_puct: f32,

    /// Visit-count scale of the log-growth exploration term.
    /// 0 disables it.
    pub pb_c_base: f32,

    /// Offset of the log-growth exploration term.
    pub pb_c_init: f32,

    /// Discount applied to future values during backpropagation.
    pub discount: f32,

    /// Dirichlet noise alpha for root node exploration.
    /// Set to 0.0 to disable noise (for evaluation).
    pub dirichlet_alpha: f32,

    /// Fraction of root prior that comes from Dirichlet noise.
    pub dirichlet_epsilon: f32,

    /// Player succession used below the root.
    pub turn_model: TurnModel,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            num_simulations: 50,
            c_puct: 1.25,
            pb_c_base: 19652.0,
            pb_c_init: 1.25,
            discount: 0.997,
            dirichlet_alpha: 0.3,
            dirichlet_epsilon: 0.25,
            turn_model: TurnModel::Alternating { players: 2 },
        }
    }
}

impl MctsConfig {
    /// Create config for self-play training (with exploration noise).
    pub fn for_training() -> Self {
        Self::default()
    }

    /// Create config for evaluation (no noise).
    pub fn for_evaluation() -> Self {
        Self {
            dirichlet_alpha: 0.0,
            dirichlet_epsilon: 0.0,
            ..Self::default()
        }
    }

    /// Create a small deterministic config for testing.
    pub fn for_testing() -> Self {
        Self {
            num_simulations: 50,
            c_puct: 1.25,
            pb_c_base: 0.0,
            pb_c_init: 0.0,
            discount: 1.0,
            dirichlet_alpha: 0.0,
            dirichlet_epsilon: 0.0,
            turn_model: TurnModel::Alternating { players: 2 },
        }
    }

    /// Builder pattern: set number of simulations.
    pub fn with_simulations(mut self, n: u32) -> Self {
        self.num_simulations = n;
        self
    }

    /// Builder pattern: use a plain c_puct constant.
    pub fn with_c_puct(mut self, c: f32) -> Self {
        self.c_puct = c;
        self.pb_c_base = 0.0;
        self
    }

    /// Builder pattern: use the log-growth exploration term.
    pub fn with_pb_c(mut self, base: f32, init: f32) -> Self {
        self.pb_c_base = base;
        self.pb_c_init = init;
        self
    }

    /// Builder pattern: set discount.
    pub fn with_discount(mut self, discount: f32) -> Self {
        self.discount = discount;
        self
    }

    /// Builder pattern: set root noise.
    pub fn with_noise(mut self, alpha: f32, epsilon: f32) -> Self {
        self.dirichlet_alpha = alpha;
        self.dirichlet_epsilon = epsilon;
        self
    }

    /// Builder pattern: set turn model.
    pub fn with_turn_model(mut self, turn_model: TurnModel) -> Self {
        self.turn_model = turn_model;
        self
    }

    /// Whether root noise is applied.
    pub fn uses_noise(&self) -> bool {
        self.dirichlet_alpha > 0.0 && self.dirichlet_epsilon > 0.0
    }

    /// Exploration coefficient for a parent with `parent_visits` visits.
    #[inline]
    pub fn exploration_coefficient(&self, parent_visits: u32) -> f32 {
        if self.pb_c_base > 0.0 {
            ((parent_visits as f32 + self.pb_c_base + 1.0) / self.pb_c_base).ln() + self.pb_c_init
        } else {
            self.c_puct
        }
    }
}
