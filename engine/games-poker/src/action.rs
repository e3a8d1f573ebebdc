//! Poker action codec.
//!
//! The action space has 103 entries: fold, call, check, then 100 raise sizes
//! spread linearly from the minimum raise (the big blind) to the maximum raise
//! (the starting stack).

use std::fmt;

use engine_core::ActionId;

pub const FOLD: ActionId = 0;
pub const CALL: ActionId = 1;
pub const CHECK: ActionId = 2;
pub const FIRST_RAISE: ActionId = 3;
pub const LAST_RAISE: ActionId = 102;

/// Total number of actions.
pub const ACTION_SPACE_SIZE: usize = LAST_RAISE as usize + 1;

/// A concrete poker decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PokerAction {
    Fold,
    Call,
    Check,
    Raise(u32),
}

impl PokerAction {
    /// Single-token form used by text poker protocols (`F`, `C`, `K`, `R<n>`).
    pub fn code(&self) -> String {
        match self {
            PokerAction::Fold => "F".to_string(),
            PokerAction::Call => "C".to_string(),
            PokerAction::Check => "K".to_string(),
            PokerAction::Raise(amount) => format!("R{amount}"),
        }
    }
}

impl fmt::Display for PokerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PokerAction::Fold => write!(f, "Fold"),
            PokerAction::Call => write!(f, "Call"),
            PokerAction::Check => write!(f, "Check"),
            PokerAction::Raise(amount) => write!(f, "Raise {amount}"),
        }
    }
}

/// Maps action indices to poker actions and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionCodec {
    pub min_raise: u32,
    pub max_raise: u32,
}

impl Default for ActionCodec {
    /// Big blind of 2, starting stack of 400.
    fn default() -> Self {
        Self {
            min_raise: 2,
            max_raise: 400,
        }
    }
}

impl ActionCodec {
    pub fn new(min_raise: u32, max_raise: u32) -> Self {
        Self {
            min_raise,
            max_raise: max_raise.max(min_raise),
        }
    }

    const RAISE_STEPS: u64 = (LAST_RAISE - FIRST_RAISE) as u64;

    /// Poker action for `index`, or `None` outside the action space.
    pub fn decode(&self, index: ActionId) -> Option<PokerAction> {
        match index {
            FOLD => Some(PokerAction::Fold),
            CALL => Some(PokerAction::Call),
            CHECK => Some(PokerAction::Check),
            FIRST_RAISE..=LAST_RAISE => {
                let span = (self.max_raise - self.min_raise) as u64;
                let offset = (index - FIRST_RAISE) as u64 * span / Self::RAISE_STEPS;
                Some(PokerAction::Raise(self.min_raise + offset as u32))
            }
            _ => None,
        }
    }

    /// Index of `action`. Raises map to the largest index whose amount does
    /// not exceed the requested amount, clamped to the raise range.
    pub fn encode(&self, action: PokerAction) -> ActionId {
        match action {
            PokerAction::Fold => FOLD,
            PokerAction::Call => CALL,
            PokerAction::Check => CHECK,
            PokerAction::Raise(amount) => {
                let amount = amount.clamp(self.min_raise, self.max_raise);
                let span = (self.max_raise - self.min_raise) as u64;
                if span == 0 {
                    return FIRST_RAISE;
                }
                // Smallest index reaching the amount, stepped back if it overshoots
                let wanted = (amount - self.min_raise) as u64;
                let mut index = FIRST_RAISE + ((wanted * Self::RAISE_STEPS).div_ceil(span)) as ActionId;
                if let Some(PokerAction::Raise(decoded)) = self.decode(index) {
                    if decoded > amount {
                        index -= 1;
                    }
                }
                index.min(LAST_RAISE)
            }
        }
    }

    /// Human-readable action names for the whole action space.
    pub fn action_names(&self) -> Vec<String> {
        (0..ACTION_SPACE_SIZE as ActionId)
            .filter_map(|i| self.decode(i))
            .map(|a| a.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_actions() {
        let codec = ActionCodec::default();
        assert_eq!(codec.decode(FOLD), Some(PokerAction::Fold));
        assert_eq!(codec.decode(CALL), Some(PokerAction::Call));
        assert_eq!(codec.decode(CHECK), Some(PokerAction::Check));
        assert_eq!(codec.decode(103), None);
    }

    #[test]
    fn test_raise_endpoints() {
        let codec = ActionCodec::default();
        assert_eq!(codec.decode(FIRST_RAISE), Some(PokerAction::Raise(2)));
        assert_eq!(codec.decode(LAST_RAISE), Some(PokerAction::Raise(400)));
        // (50 - 3) * 398 / 99 = 188 (floored), plus 2
        assert_eq!(codec.decode(50), Some(PokerAction::Raise(190)));
    }

    #[test]
    fn test_raises_are_monotonic() {
        let codec = ActionCodec::default();
        let amounts: Vec<u32> = (FIRST_RAISE..=LAST_RAISE)
            .map(|i| match codec.decode(i) {
                Some(PokerAction::Raise(a)) => a,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert!(amounts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_encode_inverts_decode() {
        let codec = ActionCodec::default();
        for index in 0..ACTION_SPACE_SIZE as ActionId {
            let action = codec.decode(index).unwrap();
            assert_eq!(codec.encode(action), index, "{action}");
        }
    }

    #[test]
    fn test_encode_clamps_raises() {
        let codec = ActionCodec::default();
        assert_eq!(codec.encode(PokerAction::Raise(0)), FIRST_RAISE);
        assert_eq!(codec.encode(PokerAction::Raise(10_000)), LAST_RAISE);
        // Between two sizes rounds down
        let idx = codec.encode(PokerAction::Raise(191));
        assert_eq!(codec.decode(idx), Some(PokerAction::Raise(190)));
    }

    #[test]
    fn test_codes_and_names() {
        assert_eq!(PokerAction::Fold.code(), "F");
        assert_eq!(PokerAction::Raise(52).code(), "R52");
        assert_eq!(PokerAction::Raise(52).to_string(), "Raise 52");

        let names = ActionCodec::default().action_names();
        assert_eq!(names.len(), ACTION_SPACE_SIZE);
        assert_eq!(names[2], "Check");
        assert_eq!(names[102], "Raise 400");
    }
}
