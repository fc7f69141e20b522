//! Player sessions for Bankroll.
//!
//! This crate answers two questions:
//!
//! 1. **Who is this player?** [`issue_credentials`] hands out a fresh
//!    [`PlayerId`](bankroll_protocol::PlayerId) plus a [`SessionSecret`].
//!    The pair is the only thing that lets a client resume an identity.
//! 2. **Which socket speaks for which player?** [`SessionManager`] binds
//!    each [`ConnectionId`](bankroll_transport::ConnectionId) to exactly one
//!    `(room, player)` and refuses state-changing requests from any other
//!    connection.
//!
//! ```text
//! Room Layer (above)     ← checks secrets against its roster
//!     ↕
//! Session Layer (this)   ← credentials + connection bindings
//!     ↕
//! Transport / Protocol   ← ConnectionId, PlayerId, RoomCode
//! ```

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::{BindOutcome, SessionManager};
pub use session::{Credentials, Session, SessionSecret, issue_credentials};
