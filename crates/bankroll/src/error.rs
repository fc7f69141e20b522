//! Unified error type for the Bankroll server.

use bankroll_protocol::{ErrorCode, ProtocolError};
use bankroll_room::RoomError;
use bankroll_session::SessionError;
use bankroll_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BankrollError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (binding, authorization).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, wrong phase).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Binding the listener or another OS-level failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BankrollError {
    /// The error code reported in a failed [`Reply`](bankroll_protocol::Reply).
    ///
    /// `None` means the reply is a bare `{ "ok": false }`.
    pub fn wire_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Room(e) => e.code(),
            Self::Session(e) => Some(e.code()),
            Self::Protocol(_) => Some(ErrorCode::InvalidMessage),
            Self::Transport(_) | Self::Io(_) => Some(ErrorCode::ServerError),
        }
    }
}
