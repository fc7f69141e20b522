//! Identity types and the top-level wire envelope.
//!
//! Everything here is serialized onto the socket, so the serde attributes
//! define the exact JSON shape the browser client sees.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::messages::{ClientRequest, Reply, ServerEvent};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A process-unique identifier for a player.
///
/// Newtype over `u64` so it can't be mixed up with other counters.
/// Serialized as a plain number (`#[serde(transparent)]`).
///
/// A `PlayerId` on its own is public information: it shows up in every
/// leaderboard. It never authorizes anything without the matching
/// session secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// The normalized key of a room.
///
/// Hosts name their rooms freely ("Family Night"); players type the name
/// back in whatever casing they like. Normalization makes those match:
/// surrounding whitespace is trimmed, inner whitespace runs collapse to
/// one space, and letters are uppercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Normalizes a user-supplied room name. Returns `None` if nothing
    /// but whitespace was given.
    pub fn normalize(raw: &str) -> Option<Self> {
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            None
        } else {
            Some(Self(collapsed.to_uppercase()))
        }
    }

    /// The normalized key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who inside a room should receive a server event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected member of the room.
    All,
    /// One specific player.
    Player(PlayerId),
}

// ---------------------------------------------------------------------------
// Room lifecycle enums
// ---------------------------------------------------------------------------

/// Lifecycle status of a room.
///
/// ```text
/// lobby → inRound → betweenRounds → inRound → … → finished
///                                                  │
///                    (restart) ←───────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomStatus {
    Lobby,
    InRound,
    BetweenRounds,
    Finished,
}

impl RoomStatus {
    /// Only lobbies accept new players.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Lobby)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Lobby => "lobby",
            Self::InRound => "inRound",
            Self::BetweenRounds => "betweenRounds",
            Self::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Scoring phase of the current roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// First three rolls of a round: the pot only grows.
    Safe,
    /// Fourth roll onward: sevens wipe the pot, doubles double it.
    Danger,
}

impl Phase {
    /// Rolls 1 to 3 of a round are safe; everything after is danger.
    /// `0` (no roll yet) also counts as safe.
    pub fn for_roll(roll_index: u32) -> Self {
        if roll_index <= 3 { Self::Safe } else { Self::Danger }
    }
}

/// Why a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoundEndReason {
    /// A seven was rolled in the danger phase.
    Seven,
    /// No connected player is left who hasn't banked.
    AllBanked,
}

impl fmt::Display for RoundEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seven => f.write_str("seven"),
            Self::AllBanked => f.write_str("allBanked"),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// What's inside an envelope.
///
/// Adjacently tagged, so a request looks like:
///
/// ```json
/// { "type": "Request", "data": { "id": 3, "body": { "type": "bank", ... } } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// Client → server. `id` is echoed back in the matching `Response`.
    Request { id: u64, body: ClientRequest },

    /// Server → client answer to a `Request`.
    Response { id: u64, body: Reply },

    /// Server → client broadcast that is not tied to a request.
    Event(ServerEvent),
}

/// The top-level message wrapper. Every frame on the wire is an Envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-direction sequence number.
    pub seq: u64,

    /// Milliseconds since the server started (server → client), or the
    /// client's own clock (client → server). Informational only.
    #[serde(default)]
    pub timestamp: u64,

    pub payload: Payload,
}
