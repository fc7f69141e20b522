//! The round/game state machine for one room.
//!
//! [`BankGame`] is synchronous and knows nothing about sockets or timers.
//! Every operation returns a [`Step`]: the events to broadcast plus a
//! [`TimerDirective`] the room actor applies to its scheduler in the same
//! turn. Because every transition out of `inRound` produces `Cancel` or a
//! different timer, a room is `inRound` exactly when its roll timer is
//! armed.
//!
//! ```text
//! lobby ─start─→ inRound ─round end─→ betweenRounds ─pause─→ inRound ─ … ─→ finished
//!                   ↑                                                        │
//!                   └────────────────────── restart ─────────────────────────┘
//! ```

use std::time::Duration;

use bankroll_protocol::{
    LeaderboardEntry, Phase, PlayerId, Recipient, RollEvent, RoomCode, RoomStatus,
    RoundEndReason, ServerEvent,
};
use bankroll_session::{Credentials, SessionSecret, issue_credentials};
use tracing::{debug, info};

use crate::config::DEFAULT_PLAYER_NAME;
use crate::dice::DiceSource;
use crate::scoring::apply_roll;
use crate::{RoomConfig, RoomError, projector};

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// One seat at the table. Players are never removed, only marked
/// disconnected, so a dropped client can come back to the same score.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u64,
    pub has_banked: bool,
    pub is_connected: bool,
    pub is_banker: bool,
    secret: SessionSecret,
}

impl Player {
    fn new(credentials: &Credentials, name: String, is_banker: bool) -> Self {
        Self {
            id: credentials.player_id,
            name,
            score: 0,
            has_banked: false,
            is_connected: true,
            is_banker,
            secret: credentials.secret.clone(),
        }
    }

    /// Still in the round: connected and not yet banked.
    pub fn is_active(&self) -> bool {
        self.is_connected && !self.has_banked
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// What the actor must do with its scheduler after a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimerDirective {
    /// Leave whatever is armed alone.
    #[default]
    Keep,
    /// Arm the next automatic roll.
    ArmRoll(Duration),
    /// Arm the end of the between-rounds pause.
    ArmNextRound(Duration),
    /// Nothing may fire any more.
    Cancel,
}

/// Output of one state-machine operation.
#[derive(Debug, Default)]
pub struct Step {
    pub events: Vec<(Recipient, ServerEvent)>,
    pub timer: TimerDirective,
    /// Final standings, set on the step that finishes the game.
    pub finished: Option<Vec<LeaderboardEntry>>,
}

impl Step {
    fn broadcast(&mut self, event: ServerEvent) {
        self.events.push((Recipient::All, event));
    }
}

// ---------------------------------------------------------------------------
// BankGame
// ---------------------------------------------------------------------------

/// All mutable state of one room.
#[derive(Debug)]
pub struct BankGame {
    code: RoomCode,
    display_name: String,
    config: RoomConfig,
    status: RoomStatus,
    /// 1-based; reaches `total_rounds + 1` once the game is finished.
    round: u32,
    roll_index: u32,
    pot: u64,
    /// Insertion order is the roller rotation order.
    players: Vec<Player>,
    group_muted: bool,
    last_roll: Option<RollEvent>,
}

impl BankGame {
    /// Creates a room in the lobby with `host_name` as its banker.
    pub fn new(
        code: RoomCode,
        display_name: impl Into<String>,
        config: RoomConfig,
        host_name: &str,
    ) -> (Self, Credentials) {
        let credentials = issue_credentials();
        let host = Player::new(&credentials, host_name.to_owned(), true);
        let game = Self {
            code,
            display_name: display_name.into(),
            config,
            status: RoomStatus::Lobby,
            round: 1,
            roll_index: 0,
            pot: 0,
            players: vec![host],
            group_muted: false,
            last_roll: None,
        };
        (game, credentials)
    }

    // -- Accessors --------------------------------------------------------

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    /// The current round, 1-based, never past `total_rounds`.
    pub fn round(&self) -> u32 {
        self.round.min(self.config.total_rounds)
    }

    pub fn rounds_completed(&self) -> u32 {
        (self.round - 1).min(self.config.total_rounds)
    }

    pub fn roll_index(&self) -> u32 {
        self.roll_index
    }

    pub fn pot(&self) -> u64 {
        self.pot
    }

    /// Derived from the roll index, never stored.
    pub fn phase(&self) -> Phase {
        Phase::for_roll(self.roll_index)
    }

    pub fn group_muted(&self) -> bool {
        self.group_muted
    }

    pub fn last_roll(&self) -> Option<&RollEvent> {
        self.last_roll.as_ref()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Connected players who have not banked this round.
    pub fn active_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_active()).count()
    }

    // -- Lobby ------------------------------------------------------------

    /// Adds a non-banker. Lobby only.
    ///
    /// # Errors
    /// - [`RoomError::Full`] if the roster is at capacity
    /// - [`RoomError::GameInProgress`] if the game has left the lobby
    pub fn join(&mut self, name: Option<&str>) -> Result<(Credentials, Step), RoomError> {
        if self.players.len() >= self.config.max_players {
            return Err(RoomError::Full(self.code.clone()));
        }
        if !self.status.is_joinable() {
            return Err(RoomError::GameInProgress(self.code.clone()));
        }

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_PLAYER_NAME);
        let credentials = issue_credentials();
        self.players.push(Player::new(&credentials, name.to_owned(), false));

        info!(
            room = %self.code,
            player_id = %credentials.player_id,
            players = self.players.len(),
            "player joined"
        );

        let mut step = Step::default();
        self.push_state(&mut step);
        Ok((credentials, step))
    }

    /// Banker starts the game from the lobby.
    ///
    /// # Errors
    /// - [`RoomError::NotBanker`] if `requester` is not the banker
    /// - [`RoomError::AlreadyStarted`] if the game has left the lobby
    pub fn start(&mut self, requester: PlayerId) -> Result<Step, RoomError> {
        self.require_banker(requester)?;
        if self.status != RoomStatus::Lobby {
            return Err(RoomError::AlreadyStarted);
        }
        info!(room = %self.code, players = self.players.len(), "game started");
        Ok(self.begin_game())
    }

    /// Banker wipes scores and counters and starts over, from any status.
    pub fn restart(&mut self, requester: PlayerId) -> Result<Step, RoomError> {
        self.require_banker(requester)?;
        info!(room = %self.code, from = %self.status, "game restarted");
        Ok(self.begin_game())
    }

    /// Banker flips the room-wide voice mute flag. Returns the new value.
    pub fn toggle_group_mute(&mut self, requester: PlayerId) -> Result<(bool, Step), RoomError> {
        self.require_banker(requester)?;
        self.group_muted = !self.group_muted;
        debug!(room = %self.code, muted = self.group_muted, "group mute toggled");

        let mut step = Step::default();
        self.push_state(&mut step);
        Ok((self.group_muted, step))
    }

    // -- Round play -------------------------------------------------------

    /// Locks the current pot into `player_id`'s score.
    ///
    /// The flag and the credit change together, and if nobody active is
    /// left the round ends in the same step.
    ///
    /// # Errors
    /// [`RoomError::NotInRound`], [`RoomError::NotMember`], or
    /// [`RoomError::AlreadyBanked`]. None of them change anything.
    pub fn bank(&mut self, player_id: PlayerId) -> Result<Step, RoomError> {
        if self.status != RoomStatus::InRound {
            return Err(RoomError::NotInRound);
        }
        let amount = self.pot;
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == player_id)
            .ok_or(RoomError::NotMember(player_id))?;
        if player.has_banked {
            return Err(RoomError::AlreadyBanked(player_id));
        }

        player.has_banked = true;
        player.score = player.score.saturating_add(amount);
        debug!(room = %self.code, %player_id, amount, score = player.score, "player banked");

        let mut step = Step::default();
        step.broadcast(ServerEvent::PlayerBanked {
            player_id,
            name: player.name.clone(),
            amount,
            score: player.score,
        });

        if self.active_count() == 0 {
            self.end_round(RoundEndReason::AllBanked, &mut step);
        } else {
            self.push_state(&mut step);
        }
        Ok(step)
    }

    /// The scheduled roll. A no-op outside `inRound`.
    pub fn roll(&mut self, dice: &mut dyn DiceSource) -> Step {
        let mut step = Step::default();
        if self.status != RoomStatus::InRound {
            debug!(room = %self.code, status = %self.status, "roll fired outside a round, skipping");
            return step;
        }
        if self.active_count() == 0 {
            self.end_round(RoundEndReason::AllBanked, &mut step);
            return step;
        }

        self.roll_index += 1;
        let roller = self.roller_name();
        let dice = dice.roll();
        let pot_before = self.pot;
        let scored = apply_roll(pot_before, self.roll_index, dice);
        self.pot = scored.pot;

        let continues = scored.round_ends.is_none() && self.active_count() > 0;
        let next_roll_in = continues.then_some(self.config.roll_interval);
        let event = projector::roll_event(self, dice, pot_before, roller, next_roll_in);
        self.last_roll = Some(event.clone());
        step.broadcast(ServerEvent::RollResult(event));

        match scored.round_ends {
            Some(reason) => self.end_round(reason, &mut step),
            None if !continues => self.end_round(RoundEndReason::AllBanked, &mut step),
            None => {
                step.timer = TimerDirective::ArmRoll(self.config.roll_interval);
                self.push_state(&mut step);
            }
        }
        step
    }

    /// The between-rounds pause is over. A no-op unless `betweenRounds`.
    pub fn begin_next_round(&mut self) -> Step {
        let mut step = Step::default();
        self.begin_next_round_into(&mut step);
        step
    }

    // -- Teardown ---------------------------------------------------------

    /// Any connected member may close a finished room.
    ///
    /// # Errors
    /// - [`RoomError::NotMember`] if `requester` is not a connected member
    /// - [`RoomError::NotFinished`] if the last round has not ended
    pub fn end_game(&mut self, requester: PlayerId) -> Result<Step, RoomError> {
        if !self.player(requester).is_some_and(|p| p.is_connected) {
            return Err(RoomError::NotMember(requester));
        }
        if self.status != RoomStatus::Finished {
            return Err(RoomError::NotFinished);
        }
        info!(room = %self.code, %requester, "game ended by player");

        let mut step = Step {
            timer: TimerDirective::Cancel,
            ..Step::default()
        };
        step.broadcast(ServerEvent::GameEnded {
            room_code: self.code.clone(),
        });
        Ok(step)
    }

    // -- Sessions ---------------------------------------------------------

    /// Resumes a player after checking their secret.
    ///
    /// # Errors
    /// [`RoomError::InvalidSession`] if the pair does not match. Nothing
    /// changes in that case.
    pub fn reconnect(&mut self, player_id: PlayerId, secret: &str) -> Result<Step, RoomError> {
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == player_id)
            .filter(|p| p.secret.verify(secret))
            .ok_or(RoomError::InvalidSession)?;
        player.is_connected = true;
        info!(room = %self.code, %player_id, score = player.score, "player reconnected");

        let mut step = Step::default();
        self.push_state(&mut step);
        if let Some(last) = &self.last_roll {
            step.events
                .push((Recipient::Player(player_id), ServerEvent::RollResult(last.clone())));
        }
        Ok(step)
    }

    /// Marks a player offline. Nothing else changes; an offline player
    /// simply stops counting as active.
    pub fn disconnect(&mut self, player_id: PlayerId) -> Step {
        let mut step = Step::default();
        if let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) {
            if player.is_connected {
                player.is_connected = false;
                info!(room = %self.code, %player_id, "player disconnected");
                self.push_state(&mut step);
            }
        }
        step
    }

    // -- Internals --------------------------------------------------------

    fn require_banker(&self, requester: PlayerId) -> Result<(), RoomError> {
        match self.player(requester) {
            Some(p) if p.is_banker => Ok(()),
            _ => Err(RoomError::NotBanker(requester)),
        }
    }

    fn begin_game(&mut self) -> Step {
        for player in &mut self.players {
            player.score = 0;
        }
        self.round = 1;
        self.reset_round();
        self.status = RoomStatus::InRound;

        let mut step = Step {
            timer: TimerDirective::ArmRoll(self.config.roll_interval),
            ..Step::default()
        };
        self.push_state(&mut step);
        step
    }

    fn reset_round(&mut self) {
        self.pot = 0;
        self.roll_index = 0;
        self.last_roll = None;
        for player in &mut self.players {
            player.has_banked = false;
        }
    }

    /// Ends the current round. Only acts while `inRound`, so a round ends
    /// at most once no matter how many triggers race for it.
    fn end_round(&mut self, reason: RoundEndReason, step: &mut Step) {
        if self.status != RoomStatus::InRound {
            return;
        }
        let finished_round = self.round;
        let pot = self.pot;
        self.round += 1;
        step.timer = TimerDirective::Cancel;

        if self.round > self.config.total_rounds {
            self.status = RoomStatus::Finished;
            let standings = projector::leaderboard(&self.players);
            info!(room = %self.code, rounds = self.config.total_rounds, %reason, "game finished");

            step.broadcast(ServerEvent::RoundEnded {
                round: finished_round,
                reason,
                pot,
                next_round_delay_ms: None,
            });
            step.broadcast(ServerEvent::GameOver {
                final_standings: standings.clone(),
            });
            step.finished = Some(standings);
            self.push_state(step);
            return;
        }

        self.status = RoomStatus::BetweenRounds;
        let pause = match reason {
            RoundEndReason::Seven => self.config.seven_pause,
            RoundEndReason::AllBanked => self.config.all_banked_pause,
        };
        info!(room = %self.code, round = finished_round, %reason, pot, "round ended");
        step.broadcast(ServerEvent::RoundEnded {
            round: finished_round,
            reason,
            pot,
            next_round_delay_ms: Some(pause.as_millis() as u64),
        });

        if pause.is_zero() {
            self.begin_next_round_into(step);
        } else {
            step.timer = TimerDirective::ArmNextRound(pause);
            self.push_state(step);
        }
    }

    fn begin_next_round_into(&mut self, step: &mut Step) {
        if self.status != RoomStatus::BetweenRounds {
            debug!(room = %self.code, status = %self.status, "next-round timer fired late, skipping");
            return;
        }
        self.reset_round();
        self.status = RoomStatus::InRound;
        step.timer = TimerDirective::ArmRoll(self.config.roll_interval);
        debug!(room = %self.code, round = self.round, "round started");
        self.push_state(step);
    }

    /// Display-only: whose turn it is to "throw", rotating through the
    /// active players in seat order.
    fn roller_name(&self) -> Option<String> {
        let active: Vec<&Player> = self.players.iter().filter(|p| p.is_active()).collect();
        if active.is_empty() {
            return None;
        }
        let idx = (self.roll_index.saturating_sub(1) as usize) % active.len();
        Some(active[idx].name.clone())
    }

    fn push_state(&self, step: &mut Step) {
        step.broadcast(ServerEvent::RoomState(projector::snapshot(self)));
    }
}

// =========================================================================
// Tests
// =========================================================================
