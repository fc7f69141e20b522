//! Error types for the session layer.

use bankroll_protocol::{ErrorCode, PlayerId, RoomCode};
use bankroll_transport::ConnectionId;

/// Errors raised while resolving who a connection speaks for.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The connection has not created, joined, or reconnected to a room.
    #[error("connection {0} is not bound to a player")]
    NotBound(ConnectionId),

    /// The connection is bound, but to a different room or player than
    /// the request claims.
    #[error("connection {connection} may not act as {claimed} in room {room}")]
    NotAuthorized {
        connection: ConnectionId,
        room: RoomCode,
        claimed: PlayerId,
    },
}

impl SessionError {
    /// The wire error code reported to the client.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotBound(_) | Self::NotAuthorized { .. } => ErrorCode::NotAuthorized,
        }
    }
}
