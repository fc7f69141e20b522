//! Per-room configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Room name used when the host leaves it blank.
pub const DEFAULT_ROOM_NAME: &str = "BANK GAME";

/// Player name used when a joiner leaves it blank.
pub const DEFAULT_PLAYER_NAME: &str = "Player";

/// Settings for one room.
///
/// Hosts pick `total_rounds` and `roll_interval` when they create the room;
/// the rest are house rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Rounds played before the game finishes.
    pub total_rounds: u32,

    /// Delay between automatic rolls.
    pub roll_interval: Duration,

    /// Roster capacity, banker included.
    pub max_players: usize,

    /// Pause after a round ends on a seven.
    pub seven_pause: Duration,

    /// Pause after a round ends because everyone banked. Zero starts the
    /// next round immediately.
    pub all_banked_pause: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            total_rounds: 20,
            roll_interval: Duration::from_millis(5000),
            max_players: 24,
            seven_pause: Duration::from_secs(3),
            all_banked_pause: Duration::ZERO,
        }
    }
}

impl RoomConfig {
    /// Upper bound on `total_rounds`.
    pub const MAX_ROUNDS: u32 = 100;
    /// Fastest allowed roll cadence.
    pub const MIN_ROLL_INTERVAL: Duration = Duration::from_millis(250);
    /// Slowest allowed roll cadence.
    pub const MAX_ROLL_INTERVAL: Duration = Duration::from_secs(60);

    /// Applies a host's create-room choices on top of these defaults.
    ///
    /// Missing values keep the default. The result still needs
    /// [`validated`](Self::validated).
    pub fn with_overrides(mut self, total_rounds: Option<u32>, roll_interval_ms: Option<u64>) -> Self {
        if let Some(rounds) = total_rounds {
            self.total_rounds = rounds;
        }
        if let Some(ms) = roll_interval_ms {
            self.roll_interval = Duration::from_millis(ms);
        }
        self
    }

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Rules:
    /// - `total_rounds == 0` falls back to the default, otherwise capped
    ///   at [`Self::MAX_ROUNDS`].
    /// - a zero `roll_interval` falls back to the default, otherwise it is
    ///   clamped to [`Self::MIN_ROLL_INTERVAL`]`..=`[`Self::MAX_ROLL_INTERVAL`].
    /// - `max_players` is at least 1.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if self.total_rounds == 0 {
            self.total_rounds = defaults.total_rounds;
        } else if self.total_rounds > Self::MAX_ROUNDS {
            warn!(
                rounds = self.total_rounds,
                max = Self::MAX_ROUNDS,
                "total_rounds exceeds maximum, clamping"
            );
            self.total_rounds = Self::MAX_ROUNDS;
        }

        if self.roll_interval.is_zero() {
            self.roll_interval = defaults.roll_interval;
        } else if self.roll_interval < Self::MIN_ROLL_INTERVAL
            || self.roll_interval > Self::MAX_ROLL_INTERVAL
        {
            let clamped = self
                .roll_interval
                .clamp(Self::MIN_ROLL_INTERVAL, Self::MAX_ROLL_INTERVAL);
            warn!(
                requested_ms = self.roll_interval.as_millis() as u64,
                clamped_ms = clamped.as_millis() as u64,
                "roll_interval out of range, clamping"
            );
            self.roll_interval = clamped;
        }

        self.max_players = self.max_players.max(1);
        self
    }
}
