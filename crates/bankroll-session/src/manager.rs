//! The session manager: which connection speaks for which player.
//!
//! Membership is explicit. A connection becomes bound when it creates,
//! joins, or reconnects to a room, and every state-changing request is
//! checked against that binding. Knowing a `PlayerId` is not enough.
//!
//! # Concurrency note
//!
//! `SessionManager` is a plain pair of `HashMap`s. The server owns one
//! behind a `tokio::sync::Mutex` and only holds the lock for map updates.

use std::collections::HashMap;
use std::time::Instant;

use bankroll_protocol::{PlayerId, RoomCode};
use bankroll_transport::ConnectionId;

use crate::{Session, SessionError};

/// What changed when a connection was bound.
#[derive(Debug, Default)]
pub struct BindOutcome {
    /// Another connection that was speaking for the same player and has
    /// now lost its binding (the player reconnected from a new socket).
    pub displaced_connection: Option<ConnectionId>,

    /// The binding this connection held before, if it was already bound
    /// to a different room or player.
    pub previous_binding: Option<Session>,
}

/// Tracks connection ↔ player bindings.
///
/// ```text
/// bind(conn, room, player) ──→ authorize(conn, room, player) ✓
///         │
///         └──→ unbind(conn) on socket close ──→ room.disconnect(player)
/// ```
#[derive(Debug, Default)]
pub struct SessionManager {
    /// Every bound connection.
    bindings: HashMap<ConnectionId, Session>,

    /// Reverse index so a reconnect can find and displace the old socket.
    by_player: HashMap<PlayerId, ConnectionId>,
}

impl SessionManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `connection` to `player_id` in `room`.
    ///
    /// A connection holds at most one binding, and a player is spoken for
    /// by at most one connection. Both older bindings are dropped and
    /// reported in the returned [`BindOutcome`].
    pub fn bind(
        &mut self,
        connection: ConnectionId,
        room: RoomCode,
        player_id: PlayerId,
    ) -> BindOutcome {
        let mut outcome = BindOutcome::default();

        if let Some(previous) = self.bindings.remove(&connection) {
            if self.by_player.get(&previous.player_id) == Some(&connection) {
                self.by_player.remove(&previous.player_id);
            }
            outcome.previous_binding = Some(previous);
        }

        if let Some(old_conn) = self.by_player.insert(player_id, connection) {
            if old_conn != connection {
                self.bindings.remove(&old_conn);
                tracing::info!(
                    %player_id,
                    old = %old_conn,
                    new = %connection,
                    "player resumed on a new connection"
                );
                outcome.displaced_connection = Some(old_conn);
            }
        }

        tracing::debug!(%connection, %room, %player_id, "connection bound");
        self.bindings.insert(
            connection,
            Session {
                connection,
                room,
                player_id,
                bound_at: Instant::now(),
            },
        );

        outcome
    }

    /// Removes the binding for a closed connection.
    ///
    /// Returns `None` if the connection was never bound or has already been
    /// displaced by a newer one. In that case the player must NOT be
    /// marked disconnected, because they are live on the other socket.
    pub fn unbind(&mut self, connection: ConnectionId) -> Option<Session> {
        let session = self.bindings.remove(&connection)?;
        if self.by_player.get(&session.player_id) == Some(&connection) {
            self.by_player.remove(&session.player_id);
        }
        tracing::debug!(
            %connection,
            player_id = %session.player_id,
            held_for = ?session.bound_at.elapsed(),
            "connection unbound"
        );
        Some(session)
    }

    /// The binding held by `connection`, if any.
    pub fn get(&self, connection: ConnectionId) -> Option<&Session> {
        self.bindings.get(&connection)
    }

    /// Checks that `connection` may act as `claimed` in `room`.
    ///
    /// # Errors
    /// - [`SessionError::NotBound`] if the connection holds no binding
    /// - [`SessionError::NotAuthorized`] if it is bound elsewhere
    pub fn authorize(
        &self,
        connection: ConnectionId,
        room: &RoomCode,
        claimed: PlayerId,
    ) -> Result<&Session, SessionError> {
        let session = self
            .bindings
            .get(&connection)
            .ok_or(SessionError::NotBound(connection))?;

        if &session.room != room || session.player_id != claimed {
            return Err(SessionError::NotAuthorized {
                connection,
                room: room.clone(),
                claimed,
            });
        }
        Ok(session)
    }

    /// The binding `connection` holds in `room`.
    ///
    /// For requests that carry no player id, such as `endGame`, the
    /// binding itself says who is asking.
    ///
    /// # Errors
    /// - [`SessionError::NotBound`] if the connection holds no binding
    /// - [`SessionError::NotAuthorized`] if it is bound to another room
    pub fn member_of(&self, connection: ConnectionId, room: &RoomCode) -> Result<&Session, SessionError> {
        let session = self
            .bindings
            .get(&connection)
            .ok_or(SessionError::NotBound(connection))?;

        if &session.room != room {
            return Err(SessionError::NotAuthorized {
                connection,
                room: room.clone(),
                claimed: session.player_id,
            });
        }
        Ok(session)
    }

    /// Number of bound connections.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if no connection is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
