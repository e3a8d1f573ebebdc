//! MCTS tree structure with arena allocation.
//!
//! Nodes are stored in a contiguous Vec and referenced by NodeId indices.
//! Every hidden state in the tree descends from the root's `represent` call.

use engine_core::{ActionId, PlayerId};

use crate::config::{MctsConfig, TurnModel};
use crate::min_max::MinMaxStats;
use crate::network::HiddenState;
use crate::node::{MctsNode, NodeId};

/// MCTS tree with arena-based node storage.
#[derive(Debug)]
pub struct MctsTree {
    /// Arena storing all nodes
    nodes: Vec<MctsNode>,

    /// Root node index (always 0 after initialization)
    root: NodeId,

    turn_model: TurnModel,
}

impl MctsTree {
    /// Create a new tree with an unexpanded root owned by `to_play`.
    pub fn new(to_play: PlayerId, turn_model: TurnModel) -> Self {
        Self {
            nodes: vec![MctsNode::new_root(to_play)],
            root: NodeId(0),
            turn_model,
        }
    }

    /// Get the root node ID.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Get a reference to a node by ID.
    #[inline]
    pub fn get(&self, id: NodeId) -> &MctsNode {
        &self.nodes[id.0 as usize]
    }

    /// Get a mutable reference to a node by ID.
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut MctsNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Allocate a new node and return its ID.
    pub fn allocate(&mut self, node: MctsNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get the total number of nodes in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty (should never be true after construction).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get the arena slice for read access.
    #[inline]
    pub fn arena(&self) -> &[MctsNode] {
        &self.nodes
    }

    /// Expand a node: store its hidden state and create one child per action.
    ///
    /// `priors[i]` is the prior of `actions[i]`.
    pub fn expand(
        &mut self,
        node_id: NodeId,
        hidden_state: HiddenState,
        actions: &[ActionId],
        priors: &[f32],
    ) {
        debug_assert_eq!(actions.len(), priors.len());
        let child_to_play = self.turn_model.next(self.get(node_id).to_play);

        self.get_mut(node_id).hidden_state = Some(hidden_state);
        for (&action, &prior) in actions.iter().zip(priors) {
            let child = self.allocate(MctsNode::new_child(node_id, action, prior, child_to_play));
            self.get_mut(node_id).children.push((action, child));
        }
    }

    /// +1 when `child` is moved by the same player as `parent`, -1 otherwise.
    #[inline]
    fn perspective(&self, parent: &MctsNode, child: &MctsNode) -> f32 {
        if parent.to_play == child.to_play {
            1.0
        } else {
            -1.0
        }
    }

    /// Value of taking the edge into `child_id`, seen by the parent's mover.
    /// `None` for unvisited children.
    pub fn edge_value(&self, child_id: NodeId, discount: f32) -> Option<f32> {
        let child = self.get(child_id);
        if child.visit_count == 0 || child.parent.is_none() {
            return None;
        }
        let sign = self.perspective(self.get(child.parent), child);
        Some(child.reward + discount * sign * child.mean_value())
    }

    /// Select the child maximizing the PUCT score.
    ///
    /// Ties go to the first child in action order.
    pub fn select_child(
        &self,
        node_id: NodeId,
        config: &MctsConfig,
        min_max: &MinMaxStats,
    ) -> Option<NodeId> {
        let node = self.get(node_id);
        let parent_visits_sqrt = (node.visit_count as f32).sqrt();
        let coefficient = config.exploration_coefficient(node.visit_count);

        let mut best: Option<(NodeId, f32)> = None;
        for &(_, child_id) in &node.children {
            let q = self
                .edge_value(child_id, config.discount)
                .map(|v| min_max.normalize(v))
                .unwrap_or(0.0);
            let score =
                q + self
                    .get(child_id)
                    .exploration_score(parent_visits_sqrt, coefficient);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((child_id, score)),
            }
        }
        best.map(|(id, _)| id)
    }

    /// Backpropagate a leaf value (from the leaf mover's perspective) to the root.
    ///
    /// At each step up the value becomes `reward + discount * value`, negated
    /// whenever the parent is moved by a different player.
    pub fn backpropagate(
        &mut self,
        leaf_id: NodeId,
        value: f32,
        discount: f32,
        min_max: &mut MinMaxStats,
    ) {
        let mut current_id = leaf_id;
        let mut current_value = value;

        while current_id.is_some() {
            let node = self.get_mut(current_id);
            node.visit_count += 1;
            node.value_sum += current_value;

            let parent_id = node.parent;
            if parent_id.is_none() {
                break;
            }

            let node = self.get(current_id);
            let sign = self.perspective(self.get(parent_id), node);
            min_max.update(node.reward + discount * sign * node.mean_value());
            current_value = node.reward + discount * sign * current_value;
            current_id = parent_id;
        }
    }

    /// Get the most visited root action (first in action order on ties).
    pub fn best_action(&self) -> Option<(ActionId, u32)> {
        let root = self.get(self.root);
        let mut best: Option<(ActionId, u32)> = None;
        for &(action, id) in &root.children {
            let visits = self.get(id).visit_count;
            match best {
                Some((_, best_visits)) if visits <= best_visits => {}
                _ => best = Some((action, visits)),
            }
        }
        best
    }

    /// Visit proportions of the root's children, dense over `num_actions`.
    pub fn root_policy(&self, num_actions: usize) -> Vec<f32> {
        let mut policy = vec![0.0; num_actions];
        let root = self.get(self.root);
        for (action, p) in root.visit_distribution(&self.nodes) {
            policy[action as usize] = p;
        }
        policy
    }

    /// Get statistics about the tree for debugging.
    pub fn stats(&self) -> TreeStats {
        let root = self.get(self.root);
        TreeStats {
            total_nodes: self.nodes.len(),
            root_visits: root.visit_count,
            root_value: root.mean_value(),
            max_depth: self.compute_max_depth(self.root, 0),
        }
    }

    fn compute_max_depth(&self, node_id: NodeId, current_depth: u32) -> u32 {
        self.get(node_id)
            .children
            .iter()
            .filter(|(_, id)| self.get(*id).is_expanded())
            .map(|(_, id)| self.compute_max_depth(*id, current_depth + 1))
            .max()
            .unwrap_or(current_depth)
    }
}

/// Statistics about an MCTS tree.
#[derive(Debug, Clone)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub root_visits: u32,
    pub root_value: f32,
    pub max_depth: u32,
}
