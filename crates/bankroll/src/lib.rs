//! # Bankroll
//!
//! Real-time server for Bank, a push-your-luck dice game for a room full
//! of people.
//!
//! The server is authoritative: clients send requests over a WebSocket,
//! each room rolls its own dice on a timer, and every change is pushed
//! back as a `room_state` snapshot.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bankroll::prelude::*;
//!
//! # async fn run() -> Result<(), BankrollError> {
//! let server = BankrollServer::builder()
//!     .config(ServerConfig::from_env())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::BankrollError;
pub use server::{BankrollServer, BankrollServerBuilder, ServerConfig};

/// Convenience re-exports for running a server and talking to it.
pub mod prelude {
    pub use crate::{BankrollError, BankrollServer, BankrollServerBuilder, ServerConfig};

    pub use bankroll_protocol::{
        ClientRequest, Codec, Envelope, ErrorCode, HighScoreEntry, JsonCodec, LeaderboardEntry,
        Payload, Phase, PlayerId, ProtocolError, Reply, RollEvent, RoomCode, RoomSnapshot,
        RoomStatus, RoundEndReason, ServerEvent,
    };
    pub use bankroll_room::{RoomConfig, RoomError};
    pub use bankroll_session::SessionError;
    pub use bankroll_transport::TransportError;
}
