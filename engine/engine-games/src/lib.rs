//! Game registration for Mirage
//!
//! This crate provides a single initialization point for registering all
//! built-in games with the engine-core registry. Poker is not registered:
//! it needs a live engine connection, so callers build a
//! `games_poker::PokerEnvironment` around their own transport.
//!
//! # Usage
//!
//! ```rust
//! use engine_games::register_all_games;
//!
//! // Call once at startup - safe to call multiple times
//! register_all_games();
//! assert!(engine_core::is_registered("corridor"));
//! ```

use std::sync::Once;

static INIT: Once = Once::new();

/// Register all built-in games with the engine-core registry.
///
/// Safe to call repeatedly and from multiple threads.
///
/// Currently registers:
/// - TicTacToe (`"tictactoe"`)
/// - Corridor (`"corridor"`)
pub fn register_all_games() {
    INIT.call_once(|| {
        games_tictactoe::register_tictactoe();
        games_corridor::register_corridor();
    });
}

pub use games_corridor::register_corridor;
pub use games_tictactoe::register_tictactoe;
