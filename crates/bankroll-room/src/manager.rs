//! Room registry: creates, tracks, and tears down rooms by code.

use std::collections::HashMap;
use std::sync::Arc;

use bankroll_protocol::{PlayerId, RoomCode, RoomSnapshot};
use bankroll_session::Credentials;
use tokio::sync::Mutex;

use crate::config::DEFAULT_ROOM_NAME;
use crate::dice::{DiceSource, RandomDice};
use crate::game::BankGame;
use crate::room::{Joined, PlayerSender, RoomHandle, spawn_room};
use crate::{HighScoreTable, RoomConfig, RoomError, projector};

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Everything the host gets back from a successful create.
#[derive(Debug)]
pub struct CreatedRoom {
    pub handle: RoomHandle,
    pub credentials: Credentials,
    pub snapshot: RoomSnapshot,
}

/// Every live room, keyed by normalized code.
///
/// This is the entry point for room operations from the server layer.
/// There is no global instance: the server owns one behind a
/// `tokio::sync::Mutex` and tests build their own.
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, RoomHandle>,
    high_scores: Arc<Mutex<HighScoreTable>>,
    defaults: RoomConfig,
}

impl RoomRegistry {
    /// Creates an empty registry whose rooms start from `defaults`.
    pub fn new(defaults: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            high_scores: Arc::new(Mutex::new(HighScoreTable::default())),
            defaults,
        }
    }

    /// The config a room gets when the host overrides nothing.
    pub fn defaults(&self) -> &RoomConfig {
        &self.defaults
    }

    /// Creates a room with fair dice. See [`create_room_with_dice`](Self::create_room_with_dice).
    pub fn create_room(
        &mut self,
        host_name: Option<&str>,
        room_name: Option<&str>,
        config: RoomConfig,
        host_sender: PlayerSender,
    ) -> Result<CreatedRoom, RoomError> {
        self.create_room_with_dice(host_name, room_name, config, host_sender, Box::new(RandomDice::new()))
    }

    /// Creates a room, seats the host as banker, and starts its actor.
    ///
    /// A blank room name falls back to the default one. The handle is
    /// published only after the actor is running, so a room that is
    /// visible to `lookup` is always fully built.
    ///
    /// # Errors
    /// - [`RoomError::MissingPlayerName`] if the host gave no name
    /// - [`RoomError::NameTaken`] if the normalized code is in use
    pub fn create_room_with_dice(
        &mut self,
        host_name: Option<&str>,
        room_name: Option<&str>,
        config: RoomConfig,
        host_sender: PlayerSender,
        dice: Box<dyn DiceSource>,
    ) -> Result<CreatedRoom, RoomError> {
        let host_name = host_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(RoomError::MissingPlayerName)?;
        let display_name = room_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_ROOM_NAME);
        let code = RoomCode::normalize(display_name).ok_or(RoomError::MissingRoomCode)?;

        if self.rooms.contains_key(&code) {
            tracing::debug!(room = %code, "create rejected, name taken");
            return Err(RoomError::NameTaken(code));
        }

        let (game, credentials) = BankGame::new(code.clone(), display_name, config.validated(), host_name);
        let snapshot = projector::snapshot(&game);
        let handle = spawn_room(
            game,
            dice,
            (credentials.player_id, host_sender),
            Arc::clone(&self.high_scores),
            DEFAULT_CHANNEL_SIZE,
        );
        self.rooms.insert(code.clone(), handle.clone());

        tracing::info!(room = %code, host = %credentials.player_id, rooms = self.rooms.len(), "room created");
        Ok(CreatedRoom {
            handle,
            credentials,
            snapshot,
        })
    }

    /// Resolves a user-typed room name to a live room.
    ///
    /// # Errors
    /// - [`RoomError::MissingRoomCode`] if `raw` is blank
    /// - [`RoomError::NotFound`] if no such room exists
    pub fn lookup(&self, raw: &str) -> Result<RoomHandle, RoomError> {
        let code = RoomCode::normalize(raw).ok_or(RoomError::MissingRoomCode)?;
        self.handle(&code).ok_or(RoomError::NotFound(code))
    }

    /// A clone of the handle for `code`, if the room exists.
    ///
    /// Callers clone handles out so they never hold the registry lock
    /// while waiting on an actor.
    pub fn handle(&self, code: &RoomCode) -> Option<RoomHandle> {
        self.rooms.get(code).cloned()
    }

    /// Seats a new player in the room named `raw`.
    pub async fn join_room(
        &self,
        raw: &str,
        player_name: Option<String>,
        sender: PlayerSender,
    ) -> Result<Joined, RoomError> {
        let handle = self.lookup(raw)?;
        handle.join(player_name, sender).await
    }

    /// Broadcasts the end of a finished game, then destroys the room.
    pub async fn end_game(&mut self, code: &RoomCode, requester: PlayerId) -> Result<(), RoomError> {
        let handle = self
            .handle(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        handle.end_game(requester).await?;
        self.destroy_room(code).await
    }

    /// Shuts a room down and removes it.
    ///
    /// Waits for the actor to confirm its timer is cancelled before the
    /// code is freed, so nothing can fire into a room that is gone.
    pub async fn destroy_room(&mut self, code: &RoomCode) -> Result<(), RoomError> {
        let handle = self
            .handle(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;

        if let Err(e) = handle.shutdown().await {
            // Already stopped; nothing left to cancel.
            tracing::warn!(room = %code, error = %e, "room actor gone before shutdown");
        }
        self.rooms.remove(code);

        tracing::info!(room = %code, rooms = self.rooms.len(), "room destroyed");
        Ok(())
    }

    /// Stops every room. Used on server shutdown.
    pub async fn shutdown_all(&mut self) {
        let codes = self.room_codes();
        for code in &codes {
            let _ = self.destroy_room(code).await;
        }
        tracing::info!(count = codes.len(), "all rooms shut down");
    }

    /// Returns the number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Lists all live room codes.
    pub fn room_codes(&self) -> Vec<RoomCode> {
        self.rooms.keys().cloned().collect()
    }

    /// The process-wide high-score table shared by every room.
    pub fn high_scores(&self) -> Arc<Mutex<HighScoreTable>> {
        Arc::clone(&self.high_scores)
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
