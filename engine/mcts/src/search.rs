//! MCTS search over a learned model.
//!
//! Implements the core loop, one simulation at a time:
//! 1. Selection: descend with PUCT until an unexpanded node
//! 2. Expansion: `dynamics` from the parent's hidden state, then `predict`
//! 3. Evaluation: the predicted value of the new node
//! 4. Backpropagation: discounted rewards and values up to the root
//!
//! The root is expanded from `represent(observation)` before the first
//! simulation. The loop stops when the [`Budget`] runs out.

use std::time::{Duration, Instant};

use engine_core::{ActionId, Observation, PlayerId};
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tracing::{debug, trace};

use crate::budget::Budget;
use crate::config::MctsConfig;
use crate::min_max::MinMaxStats;
use crate::network::{masked_priors, validate_prediction, ModelInterfaceError, Network};
use crate::node::NodeId;
use crate::tree::MctsTree;

/// Errors that can occur during MCTS search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Model interface error: {0}")]
    Model(#[from] ModelInterfaceError),

    #[error("No legal moves available")]
    NoLegalMoves,

    #[error("Action {action} outside action space of size {action_space}")]
    ActionOutOfRange { action: ActionId, action_space: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result of an MCTS search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Root visit proportions, dense over the action space.
    /// Only legal actions carry mass.
    pub policy: Vec<f32>,

    /// Mean value at the root, from the perspective of the player to move
    pub root_value: f32,

    /// Number of simulations performed
    pub simulations: u32,

    /// The budget cut this search short of its default quality
    pub budget_exhausted: bool,

    /// Wall time spent inside the search call
    pub elapsed: Duration,

    /// Wall time spent in the simulation loop, excluding root expansion
    pub simulation_time: Duration,
}

impl SearchResult {
    /// Highest-probability action (first in action order on ties).
    pub fn best_action(&self) -> Option<ActionId> {
        argmax(&self.policy)
    }
}

/// MCTS search state.
pub struct MctsSearch<'a, N: Network + ?Sized> {
    tree: MctsTree,
    network: &'a N,
    config: MctsConfig,
    min_max: MinMaxStats,
    num_actions: usize,
    all_actions: Vec<ActionId>,
}

impl<'a, N: Network + ?Sized> MctsSearch<'a, N> {
    /// Create a new search whose root is moved by `to_play`.
    pub fn new(network: &'a N, config: MctsConfig, to_play: PlayerId) -> Self {
        let num_actions = network.action_space_size();
        let tree = MctsTree::new(to_play, config.turn_model);
        Self {
            tree,
            network,
            config,
            min_max: MinMaxStats::new(),
            num_actions,
            all_actions: (0..num_actions as ActionId).collect(),
        }
    }

    /// Run the search from `observation` until `budget` is exhausted.
    pub fn run(
        &mut self,
        observation: &Observation,
        legal_actions: &[ActionId],
        budget: &Budget,
        rng: &mut ChaCha20Rng,
    ) -> Result<SearchResult, SearchError> {
        let start = Instant::now();

        let mut legal = legal_actions.to_vec();
        legal.sort_unstable();
        legal.dedup();
        if legal.is_empty() {
            return Err(SearchError::NoLegalMoves);
        }
        if let Some(&action) = legal.iter().find(|&&a| a as usize >= self.num_actions) {
            return Err(SearchError::ActionOutOfRange {
                action,
                action_space: self.num_actions,
            });
        }

        let (root_priors, predicted_value) = self.expand_root(observation, &legal)?;

        if self.config.uses_noise() {
            self.add_dirichlet_noise(rng)?;
        }

        // Stop before a simulation that would likely overrun the wall-time limit.
        // The first one is judged by the budget's cost estimate.
        let loop_start = Instant::now();
        let mut simulations = 0u32;
        let mut stopped_on_time = false;
        let mut slowest = budget.simulation_cost;
        while simulations < budget.max_simulations {
            if let Some(limit) = budget.wall_time {
                if start.elapsed() + slowest >= limit {
                    stopped_on_time = true;
                    break;
                }
            }
            let sim_start = Instant::now();
            self.simulate()?;
            slowest = slowest.max(sim_start.elapsed());
            simulations += 1;
        }
        let simulation_time = loop_start.elapsed();

        let (policy, root_value) = if simulations == 0 {
            let mut policy = vec![0.0; self.num_actions];
            for (&action, &p) in legal.iter().zip(&root_priors) {
                policy[action as usize] = p;
            }
            (policy, predicted_value)
        } else {
            let root = self.tree.get(self.tree.root());
            (self.tree.root_policy(self.num_actions), root.mean_value())
        };

        let elapsed = start.elapsed();
        let budget_exhausted = stopped_on_time || budget.is_constrained();

        debug!(
            simulations,
            max_simulations = budget.max_simulations,
            root_value,
            nodes = self.tree.len(),
            elapsed_us = elapsed.as_micros() as u64,
            budget_exhausted,
            "MCTS search complete"
        );

        Ok(SearchResult {
            policy,
            root_value,
            simulations,
            budget_exhausted,
            elapsed,
            simulation_time,
        })
    }

    /// Represent the observation and expand the root over the legal actions.
    /// Returns the masked root priors (before noise) and the predicted root value.
    fn expand_root(
        &mut self,
        observation: &Observation,
        legal: &[ActionId],
    ) -> Result<(Vec<f32>, f32), SearchError> {
        let hidden_state = self.network.represent(observation)?;
        if !hidden_state.is_finite() {
            return Err(ModelInterfaceError::NonFinite {
                what: "hidden state",
            }
            .into());
        }

        let prediction = self.network.predict(&hidden_state)?;
        validate_prediction(&prediction, self.num_actions)?;
        let priors = masked_priors(&prediction.policy, legal)?;

        let root = self.tree.root();
        self.tree.expand(root, hidden_state, legal, &priors);
        Ok((priors, prediction.value))
    }

    /// Run a single simulation (select -> expand -> evaluate -> backpropagate).
    fn simulate(&mut self) -> Result<(), SearchError> {
        let leaf_id = self.select();
        let leaf = self.tree.get(leaf_id);

        if leaf.is_expanded() {
            // Only reachable for a childless expanded node.
            let value = leaf.mean_value();
            self.tree
                .backpropagate(leaf_id, value, self.config.discount, &mut self.min_max);
            return Ok(());
        }

        let action = leaf.action;
        let parent_state = self
            .tree
            .get(leaf.parent)
            .hidden_state
            .clone()
            .ok_or_else(|| SearchError::InvalidState("leaf parent is not expanded".into()))?;

        let (hidden_state, reward) = self.network.dynamics(&parent_state, action)?;
        if !reward.is_finite() {
            return Err(ModelInterfaceError::NonFinite { what: "reward" }.into());
        }
        if !hidden_state.is_finite() {
            return Err(ModelInterfaceError::NonFinite {
                what: "hidden state",
            }
            .into());
        }

        let prediction = self.network.predict(&hidden_state)?;
        validate_prediction(&prediction, self.num_actions)?;
        let priors = masked_priors(&prediction.policy, &self.all_actions)?;

        self.tree.get_mut(leaf_id).reward = reward;
        self.tree
            .expand(leaf_id, hidden_state, &self.all_actions, &priors);
        self.tree.backpropagate(
            leaf_id,
            prediction.value,
            self.config.discount,
            &mut self.min_max,
        );

        trace!(
            leaf = leaf_id.0,
            action,
            reward,
            value = prediction.value,
            "MCTS simulation complete"
        );

        Ok(())
    }

    /// Select a leaf node by descending with PUCT.
    fn select(&self) -> NodeId {
        let mut current = self.tree.root();

        loop {
            if !self.tree.get(current).is_expanded() {
                break;
            }
            match self
                .tree
                .select_child(current, &self.config, &self.min_max)
            {
                Some(child_id) => current = child_id,
                None => break,
            }
        }

        current
    }

    /// Add Dirichlet noise to root node priors for exploration.
    fn add_dirichlet_noise(&mut self, rng: &mut ChaCha20Rng) -> Result<(), SearchError> {
        let root_id = self.tree.root();
        let children: Vec<NodeId> = self
            .tree
            .get(root_id)
            .children
            .iter()
            .map(|(_, id)| *id)
            .collect();

        if children.is_empty() {
            return Ok(());
        }

        let noise = dirichlet_noise(children.len(), self.config.dirichlet_alpha, rng)?;
        let eps = self.config.dirichlet_epsilon;

        for (child_id, n) in children.into_iter().zip(noise) {
            let child = self.tree.get_mut(child_id);
            child.prior = (1.0 - eps) * child.prior + eps * n;
        }
        Ok(())
    }

    /// Get the search tree (for inspection/debugging).
    pub fn tree(&self) -> &MctsTree {
        &self.tree
    }
}

/// First index holding the largest value, if any value is positive.
fn argmax(policy: &[f32]) -> Option<ActionId> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in policy.iter().enumerate() {
        match best {
            Some((_, best_p)) if p <= best_p => {}
            _ if p > 0.0 => best = Some((i, p)),
            _ => {}
        }
    }
    best.map(|(i, _)| i as ActionId)
}

/// Sample an action from a probability distribution.
pub fn sample_action(policy: &[f32], rng: &mut ChaCha20Rng) -> Result<ActionId, SearchError> {
    let total: f32 = policy.iter().filter(|p| **p > 0.0).sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(SearchError::NoLegalMoves);
    }

    let r: f32 = rng.gen::<f32>() * total;
    let mut cumsum = 0.0;

    for (i, &p) in policy.iter().enumerate() {
        if p <= 0.0 {
            continue;
        }
        cumsum += p;
        if r < cumsum {
            return Ok(i as ActionId);
        }
    }

    // Fallback to last non-zero action (handles floating point issues)
    policy
        .iter()
        .rposition(|&p| p > 0.0)
        .map(|i| i as ActionId)
        .ok_or(SearchError::NoLegalMoves)
}

/// Pick an action from a search policy at the given temperature.
///
/// Temperature 0 takes the most likely action, first index on ties.
/// Otherwise probabilities are raised to `1 / temperature` and sampled.
pub fn select_action(
    policy: &[f32],
    temperature: f32,
    rng: &mut ChaCha20Rng,
) -> Result<ActionId, SearchError> {
    if temperature < 1e-6 {
        return argmax(policy).ok_or(SearchError::NoLegalMoves);
    }
    if (temperature - 1.0).abs() < 1e-6 {
        return sample_action(policy, rng);
    }

    let scaled: Vec<f32> = policy
        .iter()
        .map(|&p| if p > 0.0 { p.powf(1.0 / temperature) } else { 0.0 })
        .collect();
    // Very low temperatures can underflow every entry.
    if scaled.iter().all(|&p| p <= 0.0 || !p.is_finite()) {
        return argmax(policy).ok_or(SearchError::NoLegalMoves);
    }
    sample_action(&scaled, rng)
}

/// Generate Dirichlet-distributed noise using Gamma variates.
fn dirichlet_noise(n: usize, alpha: f32, rng: &mut ChaCha20Rng) -> Result<Vec<f32>, SearchError> {
    use rand_distr::{Distribution, Gamma};

    let gamma = Gamma::new(alpha as f64, 1.0)
        .map_err(|e| SearchError::InvalidConfig(format!("dirichlet_alpha={alpha}: {e}")))?;
    let mut samples: Vec<f32> = (0..n).map(|_| gamma.sample(rng) as f32).collect();

    // Normalize
    let sum: f32 = samples.iter().sum();
    if sum > 0.0 {
        for s in &mut samples {
            *s /= sum;
        }
    }

    Ok(samples)
}

/// Convenience function to run a single MCTS search.
pub fn run_mcts<N: Network + ?Sized>(
    network: &N,
    config: MctsConfig,
    observation: &Observation,
    to_play: PlayerId,
    legal_actions: &[ActionId],
    budget: &Budget,
    rng: &mut ChaCha20Rng,
) -> Result<SearchResult, SearchError> {
    let mut search = MctsSearch::new(network, config, to_play);
    search.run(observation, legal_actions, budget, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TurnModel;
    use crate::network::{HiddenState, Prediction, UniformNetwork};
    use rand::SeedableRng;

    /// Hidden state is `[depth]`; rewards come from a per-depth script.
    struct ScriptedNetwork {
        num_actions: usize,
        reward: fn(depth: u32, action: ActionId) -> f32,
        value: f32,
    }

    impl Network for ScriptedNetwork {
        fn action_space_size(&self) -> usize {
            self.num_actions
        }

        fn represent(&self, _obs: &Observation) -> Result<HiddenState, ModelInterfaceError> {
            Ok(HiddenState::new(vec![0.0]))
        }

        fn dynamics(
            &self,
            state: &HiddenState,
            action: ActionId,
        ) -> Result<(HiddenState, f32), ModelInterfaceError> {
            let depth = state.as_slice()[0] as u32;
            let reward = (self.reward)(depth, action);
            Ok((HiddenState::new(vec![(depth + 1) as f32]), reward))
        }

        fn predict(&self, _state: &HiddenState) -> Result<Prediction, ModelInterfaceError> {
            Ok(Prediction {
                policy: vec![1.0 / self.num_actions as f32; self.num_actions],
                value: self.value,
            })
        }
    }

    /// Returns a policy of the wrong length once below the root.
    struct MalformedNetwork;

    impl Network for MalformedNetwork {
        fn action_space_size(&self) -> usize {
            3
        }

        fn represent(&self, _obs: &Observation) -> Result<HiddenState, ModelInterfaceError> {
            Ok(HiddenState::new(vec![0.0]))
        }

        fn dynamics(
            &self,
            _state: &HiddenState,
            _action: ActionId,
        ) -> Result<(HiddenState, f32), ModelInterfaceError> {
            Ok((HiddenState::new(vec![1.0]), 0.0))
        }

        fn predict(&self, state: &HiddenState) -> Result<Prediction, ModelInterfaceError> {
            let len = if state.as_slice()[0] > 0.0 { 2 } else { 3 };
            Ok(Prediction {
                policy: vec![0.5; len],
                value: 0.0,
            })
        }
    }

    struct FailingDynamics;

    impl Network for FailingDynamics {
        fn action_space_size(&self) -> usize {
            2
        }

        fn represent(&self, _obs: &Observation) -> Result<HiddenState, ModelInterfaceError> {
            Ok(HiddenState::new(vec![0.0]))
        }

        fn dynamics(
            &self,
            _state: &HiddenState,
            _action: ActionId,
        ) -> Result<(HiddenState, f32), ModelInterfaceError> {
            Err(ModelInterfaceError::call_failed("dynamics", "model unloaded"))
        }

        fn predict(&self, _state: &HiddenState) -> Result<Prediction, ModelInterfaceError> {
            Ok(Prediction {
                policy: vec![0.5, 0.5],
                value: 0.0,
            })
        }
    }

    /// Uniform network whose `predict` takes a fixed time.
    struct SlowNetwork {
        inner: UniformNetwork,
        delay: Duration,
    }

    impl Network for SlowNetwork {
        fn action_space_size(&self) -> usize {
            self.inner.action_space_size()
        }

        fn represent(&self, obs: &Observation) -> Result<HiddenState, ModelInterfaceError> {
            self.inner.represent(obs)
        }

        fn dynamics(
            &self,
            state: &HiddenState,
            action: ActionId,
        ) -> Result<(HiddenState, f32), ModelInterfaceError> {
            self.inner.dynamics(state, action)
        }

        fn predict(&self, state: &HiddenState) -> Result<Prediction, ModelInterfaceError> {
            std::thread::sleep(self.delay);
            self.inner.predict(state)
        }
    }

    fn obs() -> Observation {
        Observation::flat(vec![0.0, 1.0])
    }

    #[test]
    fn test_two_legal_actions_distribution() {
        let network = UniformNetwork::new(2);
        let config = MctsConfig::for_testing().with_turn_model(TurnModel::Single);
        let mut rng = ChaCha20Rng::seed_from_u64(42);

        let mut search = MctsSearch::new(&network, config, 0);
        let result = search
            .run(&obs(), &[0, 1], &Budget::simulations(50), &mut rng)
            .unwrap();

        assert_eq!(result.policy.len(), 2);
        let sum: f32 = result.policy.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(result.simulations, 50);
        assert!(!result.budget_exhausted);

        let tree = search.tree();
        let root = tree.get(tree.root());
        let child_visits: u32 = root
            .children
            .iter()
            .map(|(_, id)| tree.get(*id).visit_count)
            .sum();
        assert_eq!(child_visits, result.simulations);
        assert_eq!(root.visit_count, result.simulations);
    }

    #[test]
    fn test_policy_only_on_legal_actions() {
        let network = UniformNetwork::new(9);
        let mut rng = ChaCha20Rng::seed_from_u64(7);

        let result = run_mcts(
            &network,
            MctsConfig::for_testing(),
            &obs(),
            0,
            &[1, 4, 7],
            &Budget::simulations(30),
            &mut rng,
        )
        .unwrap();

        for (action, p) in result.policy.iter().enumerate() {
            if ![1, 4, 7].contains(&action) {
                assert!(p.abs() < 1e-6, "illegal action {action} got {p}");
            }
        }
        let sum: f32 = result.policy.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_immediate_reward_is_preferred() {
        // Action 0 at the root pays +1 to the root player; everything else pays 0.
        let network = ScriptedNetwork {
            num_actions: 3,
            reward: |depth, action| if depth == 0 && action == 0 { 1.0 } else { 0.0 },
            value: 0.0,
        };
        let mut rng = ChaCha20Rng::seed_from_u64(42);

        let result = run_mcts(
            &network,
            MctsConfig::for_testing().with_simulations(200),
            &obs(),
            0,
            &[0, 1, 2],
            &Budget::simulations(200),
            &mut rng,
        )
        .unwrap();

        assert_eq!(result.best_action(), Some(0));
        assert!(result.policy[0] > 0.5, "policy={:?}", result.policy);
        assert!(result.root_value > 0.0, "root value {}", result.root_value);
    }

    #[test]
    fn test_opponent_reward_is_negated_at_root() {
        // Every reply by the second player pays that player +1.
        let network = ScriptedNetwork {
            num_actions: 2,
            reward: |depth, _| if depth == 1 { 1.0 } else { 0.0 },
            value: 0.0,
        };
        let mut rng = ChaCha20Rng::seed_from_u64(3);

        let result = run_mcts(
            &network,
            MctsConfig::for_testing(),
            &obs(),
            0,
            &[0, 1],
            &Budget::simulations(100),
            &mut rng,
        )
        .unwrap();

        assert!(result.root_value < 0.0, "root value {}", result.root_value);
    }

    #[test]
    fn test_single_player_rewards_are_not_negated() {
        let network = ScriptedNetwork {
            num_actions: 2,
            reward: |depth, _| if depth == 1 { 1.0 } else { 0.0 },
            value: 0.0,
        };
        let mut rng = ChaCha20Rng::seed_from_u64(3);

        let result = run_mcts(
            &network,
            MctsConfig::for_testing().with_turn_model(TurnModel::Single),
            &obs(),
            0,
            &[0, 1],
            &Budget::simulations(100),
            &mut rng,
        )
        .unwrap();

        assert!(result.root_value > 0.0, "root value {}", result.root_value);
    }

    #[test]
    fn test_malformed_policy_fails_fast() {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let err = run_mcts(
            &MalformedNetwork,
            MctsConfig::for_testing(),
            &obs(),
            0,
            &[0, 1, 2],
            &Budget::simulations(10),
            &mut rng,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            SearchError::Model(ModelInterfaceError::ShapeMismatch {
                what: "policy",
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_failed_dynamics_call_fails_fast() {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let err = run_mcts(
            &FailingDynamics,
            MctsConfig::for_testing(),
            &obs(),
            0,
            &[0, 1],
            &Budget::simulations(10),
            &mut rng,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            SearchError::Model(ModelInterfaceError::CallFailed {
                function: "dynamics",
                ..
            })
        ));
    }

    #[test]
    fn test_no_legal_moves() {
        let network = UniformNetwork::new(2);
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let err = run_mcts(
            &network,
            MctsConfig::for_testing(),
            &obs(),
            0,
            &[],
            &Budget::simulations(10),
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, SearchError::NoLegalMoves));
    }

    #[test]
    fn test_legal_action_out_of_range() {
        let network = UniformNetwork::new(2);
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let err = run_mcts(
            &network,
            MctsConfig::for_testing(),
            &obs(),
            0,
            &[0, 5],
            &Budget::simulations(10),
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SearchError::ActionOutOfRange {
                action: 5,
                action_space: 2
            }
        ));
    }

    #[test]
    fn test_expired_deadline_returns_masked_prior() {
        let network = UniformNetwork::new(4);
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let budget = Budget {
            max_simulations: 100,
            wall_time: Some(Duration::ZERO),
            clock_limited: true,
            degraded: true,
            simulation_cost: Duration::ZERO,
        };

        let result = run_mcts(
            &network,
            MctsConfig::for_testing(),
            &obs(),
            0,
            &[1, 2],
            &budget,
            &mut rng,
        )
        .unwrap();

        assert_eq!(result.simulations, 0);
        assert!(result.budget_exhausted);
        assert!(result.policy[0].abs() < 1e-6);
        assert!((result.policy[1] - 0.5).abs() < 1e-6);
        assert!((result.policy[2] - 0.5).abs() < 1e-6);
        assert!(result.policy[3].abs() < 1e-6);
    }

    #[test]
    fn test_wall_time_stops_search() {
        let network = SlowNetwork {
            inner: UniformNetwork::new(2),
            delay: Duration::from_millis(2),
        };
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let budget = Budget {
            max_simulations: 1_000,
            wall_time: Some(Duration::from_millis(30)),
            clock_limited: false,
            degraded: false,
            simulation_cost: Duration::ZERO,
        };

        let result = run_mcts(
            &network,
            MctsConfig::for_testing(),
            &obs(),
            0,
            &[0, 1],
            &budget,
            &mut rng,
        )
        .unwrap();

        assert!(result.simulations < 1_000);
        assert!(result.budget_exhausted);
        assert!(result.elapsed < Duration::from_secs(1));
    }

    #[test]
    fn test_root_noise_keeps_priors_normalized() {
        let network = UniformNetwork::new(5);
        let config = MctsConfig::for_testing().with_noise(0.3, 0.25);
        let mut rng = ChaCha20Rng::seed_from_u64(11);

        let mut search = MctsSearch::new(&network, config, 0);
        search
            .run(&obs(), &[0, 1, 2, 3, 4], &Budget::simulations(0), &mut rng)
            .unwrap();

        let tree = search.tree();
        let priors: Vec<f32> = tree
            .get(tree.root())
            .children
            .iter()
            .map(|(_, id)| tree.get(*id).prior)
            .collect();
        let sum: f32 = priors.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(priors.iter().any(|p| (p - 0.2).abs() > 1e-4));
    }

    #[test]
    fn test_negative_noise_alpha_disables_noise() {
        let network = UniformNetwork::new(2);
        let config = MctsConfig::for_testing().with_noise(-1.0, 0.25);
        let mut rng = ChaCha20Rng::seed_from_u64(0);

        assert!(!config.uses_noise());
        let result = run_mcts(
            &network,
            config,
            &obs(),
            0,
            &[0, 1],
            &Budget::simulations(4),
            &mut rng,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_sample_action() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let policy = vec![0.0, 0.5, 0.3, 0.2, 0.0];

        let mut counts = [0u32; 5];
        for _ in 0..1000 {
            let action = sample_action(&policy, &mut rng).unwrap();
            counts[action as usize] += 1;
        }

        // Action 0 and 4 should never be selected
        assert_eq!(counts[0], 0);
        assert_eq!(counts[4], 0);

        assert!(counts[1] > counts[2]);
        assert!(counts[2] > counts[3]);
    }

    #[test]
    fn test_select_action_greedy_tie_break() {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let policy = vec![0.1, 0.45, 0.45];
        for _ in 0..10 {
            assert_eq!(select_action(&policy, 0.0, &mut rng).unwrap(), 1);
        }
        assert!(select_action(&[0.0, 0.0], 0.0, &mut rng).is_err());
    }

    #[test]
    fn test_select_action_low_temperature_sharpens() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let policy = vec![0.4, 0.6];
        let picks_of_1 = (0..500)
            .filter(|_| select_action(&policy, 0.25, &mut rng).unwrap() == 1)
            .count();
        // 0.6^4 / (0.4^4 + 0.6^4) is about 0.84
        assert!(picks_of_1 > 350, "picked action 1 {picks_of_1} times");
    }

    #[test]
    fn test_dirichlet_noise() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let noise = dirichlet_noise(5, 0.3, &mut rng).unwrap();

        let sum: f32 = noise.iter().sum();
        assert!((sum - 1.0).abs() < 0.01);
        for &n in &noise {
            assert!(n >= 0.0);
        }
    }

    #[test]
    fn test_cost_estimate_guards_first_simulation() {
        let network = UniformNetwork::new(2);
        let budget = Budget {
            max_simulations: 100,
            wall_time: Some(Duration::from_millis(10)),
            clock_limited: true,
            degraded: false,
            simulation_cost: Duration::from_millis(20),
        };

        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let result = run_mcts(
            &network,
            MctsConfig::for_testing(),
            &obs(),
            0,
            &[0, 1],
            &budget,
            &mut rng,
        )
        .unwrap();
        assert_eq!(result.simulations, 0);
        assert!(result.budget_exhausted);

        // Without an estimate the same limit fits fast simulations
        let budget = Budget {
            wall_time: Some(Duration::from_secs(1)),
            simulation_cost: Duration::ZERO,
            ..budget
        };
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let result = run_mcts(
            &network,
            MctsConfig::for_testing(),
            &obs(),
            0,
            &[0, 1],
            &budget,
            &mut rng,
        )
        .unwrap();
        assert!(result.simulations > 0);
    }

    #[test]
    fn test_simulation_time_excludes_root_expansion() {
        let delay = Duration::from_millis(30);
        let network = SlowNetwork {
            inner: UniformNetwork::new(2),
            delay,
        };
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let result = run_mcts(
            &network,
            MctsConfig::for_testing(),
            &obs(),
            0,
            &[0, 1],
            &Budget::simulations(2),
            &mut rng,
        )
        .unwrap();

        assert_eq!(result.simulations, 2);
        assert!(result.simulation_time >= delay * 2);
        assert!(result.elapsed - result.simulation_time >= delay);

        // The controller learns the loop cost, not the root predict
        let mut controller = crate::budget::TimeBudgetController::new(Default::default());
        controller.record_search(result.simulations, result.simulation_time);
        let measured = controller.measured_cost().unwrap();
        let expected = result.simulation_time / 2;
        let diff = measured.max(expected) - measured.min(expected);
        assert!(diff < Duration::from_micros(1), "measured {measured:?}");
        assert!(measured < result.elapsed / 2);
    }
}
