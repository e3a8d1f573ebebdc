//! Heads-up poker for Mirage.
//!
//! The poker engine runs out of process and speaks its own protocol. This
//! crate stops at the [`PokerTransport`] boundary: it owns the action codec,
//! the clock settings for training and competition matches, and a
//! [`PokerEnvironment`] that turns transport replies into environment steps.
//!
//! Hidden cards are not modelled by the search. Whatever the encoded
//! observation leaves out, the learned representation has to absorb.

pub mod action;
pub mod clock;
pub mod environment;
pub mod transport;

pub use action::{ActionCodec, PokerAction, ACTION_SPACE_SIZE};
pub use clock::{PokerClockSettings, MATCH_CLOCK};
pub use environment::{PokerEnvironment, DISCONNECT_PENALTY, OBSERVATION_SIZE};
pub use transport::{PokerTransport, PokerUpdate, TransportError};
