//! Error types for the room layer.

use bankroll_protocol::{ErrorCode, PlayerId, RoomCode};

/// Errors that can occur during room operations.
///
/// Every variant leaves the room untouched: validation happens before any
/// mutation.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// A room with this normalized code already exists.
    #[error("room {0} already exists")]
    NameTaken(RoomCode),

    /// The room does not exist (never created, or already ended).
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// Create was called without a usable player name.
    #[error("a player name is required")]
    MissingPlayerName,

    /// Join or reconnect was called without a usable room code.
    #[error("a room code is required")]
    MissingRoomCode,

    /// The roster is at capacity.
    #[error("room {0} is full")]
    Full(RoomCode),

    /// A join arrived after the game left the lobby.
    #[error("room {0} has already started")]
    GameInProgress(RoomCode),

    /// The banker tried to start a game that is not in the lobby.
    #[error("game already started")]
    AlreadyStarted,

    /// Only the banker may do this.
    #[error("player {0} is not the banker")]
    NotBanker(PlayerId),

    /// The player is not a connected member of the room.
    #[error("player {0} is not a member of this room")]
    NotMember(PlayerId),

    /// `(playerId, secret)` did not match the roster.
    #[error("invalid session")]
    InvalidSession,

    /// The player already banked this round.
    #[error("player {0} already banked this round")]
    AlreadyBanked(PlayerId),

    /// Banking is only possible while a round is in progress.
    #[error("no round in progress")]
    NotInRound,

    /// End-game was requested before the last round finished.
    #[error("game is not finished")]
    NotFinished,

    /// The room's actor is gone or its command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// The wire error code reported to the client.
    ///
    /// `None` for transient no-ops (double bank, bank between rounds),
    /// which are answered with a bare `{ "ok": false }`.
    pub fn code(&self) -> Option<ErrorCode> {
        let code = match self {
            Self::NameTaken(_) => ErrorCode::GameNameTaken,
            Self::NotFound(_) => ErrorCode::GameNotFound,
            Self::MissingPlayerName => ErrorCode::MissingPlayerName,
            Self::MissingRoomCode => ErrorCode::MissingGameName,
            Self::Full(_) => ErrorCode::GameFull,
            Self::GameInProgress(_) => ErrorCode::GameAlreadyStarted,
            Self::AlreadyStarted => ErrorCode::AlreadyStarted,
            Self::NotBanker(_) => ErrorCode::NotBanker,
            Self::NotMember(_) => ErrorCode::NotAuthorized,
            Self::InvalidSession => ErrorCode::InvalidSession,
            Self::NotFinished => ErrorCode::GameNotFinished,
            Self::Unavailable(_) => ErrorCode::ServerError,
            Self::AlreadyBanked(_) | Self::NotInRound => return None,
        };
        Some(code)
    }
}
