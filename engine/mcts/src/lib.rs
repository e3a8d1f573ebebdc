//! Monte Carlo Tree Search (MCTS) over a learned model, MuZero-style.
//!
//! This crate searches over latent states produced by a [`Network`] rather
//! than over the real game. Only the root touches a real observation.
//!
//! # Overview
//!
//! Each simulation consists of four phases:
//!
//! 1. **Selection**: Traverse the tree with PUCT, combining a min-max
//!    normalized Q value with a prior-driven exploration term
//! 2. **Expansion**: At an unexpanded node, call `dynamics` on the parent's
//!    hidden state and `predict` on the result; add one child per action
//! 3. **Evaluation**: The predicted value of the new node
//! 4. **Backpropagation**: Walk back to the root accumulating
//!    `reward + discount * value`, negated across a change of player
//!
//! # Usage
//!
//! ```rust
//! use engine_core::Observation;
//! use mcts::{run_mcts, BudgetConfig, MctsConfig, TimeBudgetController, UniformNetwork};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha20Rng;
//!
//! let network = UniformNetwork::new(2);
//! let controller = TimeBudgetController::new(BudgetConfig::default());
//! let budget = controller.allocate(None, 10, 50);
//!
//! let mut rng = ChaCha20Rng::seed_from_u64(42);
//! let result = run_mcts(
//!     &network,
//!     MctsConfig::for_evaluation(),
//!     &Observation::flat(vec![0.0; 4]),
//!     0,
//!     &[0, 1],
//!     &budget,
//!     &mut rng,
//! )
//! .unwrap();
//!
//! assert_eq!(result.simulations, 50);
//! ```
//!
//! # Time budgets
//!
//! Every search is bounded by a [`Budget`] from the [`TimeBudgetController`]:
//! a fixed simulation count for untimed games, or a simulation cap plus a
//! wall-time limit for games played against a real clock.

pub mod budget;
pub mod config;
pub mod min_max;
pub mod network;
pub mod node;
pub mod search;
pub mod tree;

// Re-export main types
pub use budget::{Budget, BudgetConfig, TimeBudgetController};
pub use config::{MctsConfig, TurnModel};
pub use min_max::MinMaxStats;
pub use network::{HiddenState, ModelInterfaceError, Network, Prediction, UniformNetwork};
pub use node::{MctsNode, NodeId};
pub use search::{run_mcts, sample_action, select_action, MctsSearch, SearchError, SearchResult};
pub use tree::{MctsTree, TreeStats};
