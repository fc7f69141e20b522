//! Client requests, server replies, broadcast events, and the view types
//! they carry.
//!
//! Field names are camelCase on the wire to match the browser client.

use serde::{Deserialize, Serialize};

use crate::{Phase, PlayerId, RoomCode, RoomStatus, RoundEndReason};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Everything a client can ask the server to do.
///
/// Internally tagged by `"type"`:
///
/// ```json
/// { "type": "joinRoom", "roomCode": "family night", "playerName": "Ada" }
/// ```
///
/// Fields whose absence has a dedicated error code (`missing_game_name`,
/// `invalid_session`, ...) are `Option`s so the handler can report that
/// code instead of a generic decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientRequest {
    /// Create a room and become its banker.
    CreateRoom {
        player_name: Option<String>,
        room_name: Option<String>,
        total_rounds: Option<u32>,
        roll_interval_ms: Option<u64>,
    },

    /// Join a room that is still in the lobby.
    JoinRoom {
        room_code: Option<String>,
        player_name: Option<String>,
    },

    /// Resume a previous identity after the socket dropped.
    Reconnect {
        room_code: Option<String>,
        player_id: Option<PlayerId>,
        secret: Option<String>,
    },

    /// Banker starts the game from the lobby.
    StartGame { room_code: String, player_id: PlayerId },

    /// Banker resets scores and counters and starts over.
    RestartGame { room_code: String, player_id: PlayerId },

    /// Lock in the current pot for this round.
    Bank { room_code: String, player_id: PlayerId },

    /// Tear down a finished room.
    EndGame { room_code: String },

    /// Banker toggles the room-wide voice mute flag.
    ToggleGroupMute { room_code: String },

    /// Keep-alive. Answered with `serverTime`.
    Heartbeat { client_time: u64 },
}

// ---------------------------------------------------------------------------
// Server → client: replies
// ---------------------------------------------------------------------------

/// Machine-readable failure reason carried in a [`Reply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MissingPlayerName,
    MissingGameName,
    GameNameTaken,
    GameNotFound,
    GameFull,
    GameAlreadyStarted,
    InvalidSession,
    NotBanker,
    AlreadyStarted,
    NotAuthorized,
    GameNotFinished,
    InvalidMessage,
    ServerError,
}

/// Answer to a single [`ClientRequest`].
///
/// `{ "ok": true, "room": {...}, "playerId": 3, "secret": "..." }` on
/// success, `{ "ok": false, "error": "game_full" }` on failure. Absent
/// fields are omitted rather than sent as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    /// Only ever sent to the connection that owns it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_time: Option<u64>,
}

impl Reply {
    /// A bare `{ "ok": true }`.
    pub fn ok() -> Self {
        Self { ok: true, ..Self::default() }
    }

    /// `{ "ok": false, "error": code }`.
    pub fn error(code: ErrorCode) -> Self {
        Self { error: Some(code), ..Self::default() }
    }

    /// `{ "ok": false }` with an error code when there is one. Transient
    /// no-ops such as a second `bank` carry none.
    pub fn failure(code: Option<ErrorCode>) -> Self {
        Self { error: code, ..Self::default() }
    }

    pub fn with_room(mut self, room: RoomSnapshot) -> Self {
        self.room = Some(room);
        self
    }

    pub fn with_credentials(mut self, player_id: PlayerId, secret: String) -> Self {
        self.player_id = Some(player_id);
        self.secret = Some(secret);
        self
    }

    pub fn with_server_time(mut self, server_time: u64) -> Self {
        self.server_time = Some(server_time);
        self
    }
}

// ---------------------------------------------------------------------------
// Server → client: broadcast events
// ---------------------------------------------------------------------------

/// Events pushed to every member of a room.
///
/// Internally tagged by `"event"`; a snapshot looks like
/// `{ "event": "room_state", "code": "...", "pot": 12, ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Full player-visible room state. Sent after every mutation.
    RoomState(RoomSnapshot),

    /// One automatic roll.
    RollResult(RollEvent),

    /// A player locked in the pot.
    PlayerBanked {
        player_id: PlayerId,
        name: String,
        amount: u64,
        score: u64,
    },

    /// A round is over. `round` is the round that just finished.
    RoundEnded {
        round: u32,
        reason: RoundEndReason,
        pot: u64,
        next_round_delay_ms: Option<u64>,
    },

    /// The last round is over.
    GameOver { final_standings: Vec<LeaderboardEntry> },

    /// The room has been torn down and its code is free again.
    GameEnded { room_code: RoomCode },

    /// Process-wide top scores, after a game finishes.
    HighScores { top: Vec<HighScoreEntry> },

    /// Human-readable notice for the client to display.
    ErrorMessage { text: String },
}

// ---------------------------------------------------------------------------
// View types
// ---------------------------------------------------------------------------

/// One row of the leaderboard. No secret, no transport ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub player_id: PlayerId,
    pub name: String,
    pub score: u64,
    pub has_banked_this_round: bool,
    pub is_connected: bool,
    pub is_banker: bool,
}

/// Payload of a `roll_result` event, also kept as the room's last roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollEvent {
    pub d1: u8,
    pub d2: u8,
    pub sum: u8,
    pub is_double: bool,
    pub is_seven: bool,
    pub phase: Phase,
    pub round: u32,
    pub roll_index: u32,
    pub pot_before: u64,
    pub pot_after: u64,
    /// Display-only: the active player the table "passes the dice" to.
    pub roller: Option<String>,
    /// `None` when this roll ended the round.
    pub next_roll_in_ms: Option<u64>,
}

/// Everything a client needs to render a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub display_name: String,
    pub status: RoomStatus,
    pub round: u32,
    pub total_rounds: u32,
    pub rounds_completed: u32,
    pub roll_index: u32,
    pub pot: u64,
    pub phase: Phase,
    pub roll_interval_ms: u64,
    pub group_muted: bool,
    pub active_players: usize,
    pub last_roll: Option<RollEvent>,
    /// Sorted by score descending, then name ascending.
    pub players: Vec<LeaderboardEntry>,
}

/// One row of the process-wide high-score list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighScoreEntry {
    pub name: String,
    pub score: u64,
    pub room: String,
}
