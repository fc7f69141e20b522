//! Wire protocol for Bankroll.
//!
//! This crate defines what travels between the browser and the server:
//!
//! - **Types** ([`Envelope`], [`PlayerId`], [`RoomCode`], [`RoomStatus`], ...)
//!   for identity and the frame wrapper.
//! - **Messages** ([`ClientRequest`], [`Reply`], [`ServerEvent`]) and the
//!   view types they carry ([`RoomSnapshot`], [`LeaderboardEntry`], ...).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) to turn them into bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! It knows nothing about sockets or rooms.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session / Room
//! ```

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{
    ClientRequest, ErrorCode, HighScoreEntry, LeaderboardEntry, Reply, RollEvent,
    RoomSnapshot, ServerEvent,
};
pub use types::{
    Envelope, Payload, Phase, PlayerId, Recipient, RoomCode, RoomStatus, RoundEndReason,
};
