//! Game clock settings for poker matches.

use std::time::Duration;

/// Total clock per match, in both modes.
pub const MATCH_CLOCK: Duration = Duration::from_secs(600);

/// How a poker match treats its clock.
///
/// Training matches run with a generous clock that is not enforced, so search
/// uses its full simulation count. Competition matches enforce the clock and
/// expose it to the time budget controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PokerClockSettings {
    /// Clock for the whole match.
    pub total_clock: Duration,
    /// Whether running out of clock loses the match.
    pub enforce_clock: bool,
    /// Longest wait for the engine's reply to a single action.
    pub player_timeout: Duration,
}

impl PokerClockSettings {
    pub fn training() -> Self {
        Self {
            total_clock: MATCH_CLOCK,
            enforce_clock: false,
            player_timeout: Duration::from_secs(300),
        }
    }

    pub fn competition() -> Self {
        Self {
            total_clock: MATCH_CLOCK,
            enforce_clock: true,
            player_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_total_clock(mut self, clock: Duration) -> Self {
        self.total_clock = clock;
        self
    }

    pub fn with_player_timeout(mut self, timeout: Duration) -> Self {
        self.player_timeout = timeout;
        self
    }
}

impl Default for PokerClockSettings {
    fn default() -> Self {
        Self::training()
    }
}
