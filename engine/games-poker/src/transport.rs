//! Boundary to the external poker engine.
//!
//! A transport owns the connection and the message format. It hands the
//! environment already-encoded observations plus the few fields the pipeline
//! needs (clock, bankroll change, end of match).

use std::time::Duration;

use engine_core::{ActionId, Observation};
use thiserror::Error;

use crate::{PokerAction, PokerClockSettings};

/// One decoded message from the poker engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PokerUpdate {
    pub observation: Observation,
    /// Clock left for this player, if the engine reports one.
    pub time_remaining: Option<Duration>,
    /// Chips won or lost since the previous update.
    pub bankroll_delta: i64,
    /// Actions the engine accepts next. `None` means the whole action space.
    pub legal_actions: Option<Vec<ActionId>>,
    pub game_over: bool,
}

impl PokerUpdate {
    pub fn new(observation: Observation) -> Self {
        Self {
            observation,
            time_remaining: None,
            bankroll_delta: 0,
            legal_actions: None,
            game_over: false,
        }
    }

    pub fn with_time_remaining(mut self, remaining: Duration) -> Self {
        self.time_remaining = Some(remaining);
        self
    }

    pub fn with_bankroll_delta(mut self, delta: i64) -> Self {
        self.bankroll_delta = delta;
        self
    }

    pub fn with_legal_actions(mut self, legal: Vec<ActionId>) -> Self {
        self.legal_actions = Some(legal);
        self
    }

    pub fn finished(mut self) -> Self {
        self.game_over = true;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("Connection lost: {0}")]
    Disconnected(String),

    #[error("No reply within {0:?}")]
    Timeout(Duration),

    #[error("Malformed engine message: {0}")]
    Protocol(String),
}

/// Connection to a poker engine.
pub trait PokerTransport: Send + std::fmt::Debug {
    /// Start a match and return the first update.
    fn start(&mut self, clock: &PokerClockSettings) -> Result<PokerUpdate, TransportError>;

    fn send_action(&mut self, action: PokerAction) -> Result<(), TransportError>;

    /// Wait up to `timeout` for the next update.
    fn receive(&mut self, timeout: Duration) -> Result<PokerUpdate, TransportError>;

    fn close(&mut self);
}
