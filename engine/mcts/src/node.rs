//! MCTS tree node representation.
//!
//! Each node stands for the latent state reached by taking `action` from the
//! parent. Its hidden state is filled in lazily when the node is expanded.

use engine_core::{ActionId, PlayerId};

use crate::network::HiddenState;

/// Index into the node arena. Using a newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn is_some(self) -> bool {
        !self.is_none()
    }
}

/// A node in the MCTS tree.
#[derive(Debug, Clone)]
pub struct MctsNode {
    /// Parent node index (NONE for root)
    pub parent: NodeId,

    /// Action that led to this node from parent
    pub action: ActionId,

    /// Latent state; `None` until the node is expanded
    pub hidden_state: Option<HiddenState>,

    /// Number of times this node has been visited
    pub visit_count: u32,

    /// Sum of backed-up values, from the perspective of `to_play`.
    pub value_sum: f32,

    /// Reward predicted by `dynamics` for the parent's mover
    pub reward: f32,

    /// Prior probability of selecting this node from its parent
    pub prior: f32,

    /// Player to move at this node
    pub to_play: PlayerId,

    /// Children: Vec of (action, NodeId) pairs in action order.
    /// Empty until node is expanded.
    pub children: Vec<(ActionId, NodeId)>,
}

impl MctsNode {
    /// Create a new, unexpanded root node.
    pub fn new_root(to_play: PlayerId) -> Self {
        Self {
            parent: NodeId::NONE,
            action: 0,
            hidden_state: None,
            visit_count: 0,
            value_sum: 0.0,
            reward: 0.0,
            prior: 1.0,
            to_play,
            children: Vec::new(),
        }
    }

    /// Create a new, unexpanded child node.
    pub fn new_child(parent: NodeId, action: ActionId, prior: f32, to_play: PlayerId) -> Self {
        Self {
            parent,
            action,
            hidden_state: None,
            visit_count: 0,
            value_sum: 0.0,
            reward: 0.0,
            prior,
            to_play,
            children: Vec::new(),
        }
    }

    /// Mean value from this node's own perspective.
    /// Returns 0.0 if never visited.
    #[inline]
    pub fn mean_value(&self) -> f32 {
        if self.visit_count == 0 {
            0.0
        } else {
            self.value_sum / self.visit_count as f32
        }
    }

    /// A node is expanded once its hidden state has been computed.
    #[inline]
    pub fn is_expanded(&self) -> bool {
        self.hidden_state.is_some()
    }

    /// Exploration term of the PUCT score:
    /// `coefficient * P(s,a) * sqrt(N_parent) / (1 + N(s,a))`.
    ///
    /// Takes a pre-computed sqrt(parent_visits) so callers comparing many
    /// children only compute it once.
    #[inline]
    pub fn exploration_score(&self, parent_visits_sqrt: f32, coefficient: f32) -> f32 {
        coefficient * self.prior * parent_visits_sqrt / (1.0 + self.visit_count as f32)
    }

    /// Visit proportions over children, in child order.
    /// Empty if no child has been visited.
    pub fn visit_distribution(&self, arena: &[MctsNode]) -> Vec<(ActionId, f32)> {
        let total_visits: u32 = self
            .children
            .iter()
            .map(|(_, id)| arena[id.0 as usize].visit_count)
            .sum();

        if total_visits == 0 {
            return Vec::new();
        }

        self.children
            .iter()
            .map(|(action, id)| {
                let node = &arena[id.0 as usize];
                (*action, node.visit_count as f32 / total_visits as f32)
            })
            .collect()
    }
}
