//! Scoring engine: how one roll changes the pot.
//!
//! Pure functions only. No I/O, no timers, no randomness.

use bankroll_protocol::{Phase, RoundEndReason};

/// Bonus added for a seven during the safe phase.
pub const SAFE_SEVEN_BONUS: u64 = 70;

/// A pair of dice, each showing 1 to 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dice {
    pub d1: u8,
    pub d2: u8,
}

impl Dice {
    pub fn new(d1: u8, d2: u8) -> Self {
        debug_assert!((1..=6).contains(&d1) && (1..=6).contains(&d2));
        Self { d1, d2 }
    }

    pub fn sum(self) -> u8 {
        self.d1 + self.d2
    }

    pub fn is_double(self) -> bool {
        self.d1 == self.d2
    }

    pub fn is_seven(self) -> bool {
        self.sum() == 7
    }
}

/// Result of applying one roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scored {
    pub pot: u64,
    /// `Some(Seven)` when the roll ended the round.
    pub round_ends: Option<RoundEndReason>,
}

/// Applies a roll to the pot.
///
/// `roll_index` is the 1-based index of *this* roll within the round.
///
/// | phase  | seven            | double (not seven) | other      |
/// |--------|------------------|--------------------|------------|
/// | safe   | `+70`            | `+sum`             | `+sum`     |
/// | danger | `0`, round ends  | `×2`               | `+sum`     |
pub fn apply_roll(pot: u64, roll_index: u32, dice: Dice) -> Scored {
    let sum = u64::from(dice.sum());
    match Phase::for_roll(roll_index) {
        Phase::Safe => {
            let bonus = if dice.is_seven() { SAFE_SEVEN_BONUS } else { sum };
            Scored {
                pot: pot.saturating_add(bonus),
                round_ends: None,
            }
        }
        Phase::Danger if dice.is_seven() => Scored {
            pot: 0,
            round_ends: Some(RoundEndReason::Seven),
        },
        Phase::Danger if dice.is_double() => Scored {
            pot: pot.saturating_mul(2),
            round_ends: None,
        },
        Phase::Danger => Scored {
            pot: pot.saturating_add(sum),
            round_ends: None,
        },
    }
}
