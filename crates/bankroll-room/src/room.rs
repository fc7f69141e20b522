//! Room actor: an isolated Tokio task that owns one [`BankGame`].
//!
//! Each room runs in its own task and talks to the outside world through
//! an mpsc channel. Player commands and scheduler fires are handled by the
//! same loop, so nothing else ever touches the game state.

use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use bankroll_protocol::{PlayerId, Recipient, RoomCode, RoomSnapshot, RoomStatus, ServerEvent};
use bankroll_session::Credentials;
use bankroll_tick::{Fired, RollScheduler, TimerKind, TimerMetrics};
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::dice::DiceSource;
use crate::game::{BankGame, Step, TimerDirective};
use crate::{HighScoreTable, RoomError, projector};

/// Channel sender for delivering events to a player's connection handler.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// Reply to a successful join.
#[derive(Debug)]
pub struct Joined {
    pub credentials: Credentials,
    pub snapshot: RoomSnapshot,
}

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in most variants is the reply channel: the caller
/// sends a command and waits for the response on it.
pub(crate) enum RoomCommand {
    Join {
        name: Option<String>,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<Joined, RoomError>>,
    },
    Reconnect {
        player_id: PlayerId,
        secret: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<RoomSnapshot, RoomError>>,
    },
    /// Fire-and-forget: the socket is already gone. With `via` set, only
    /// acts if that channel is still the player's current one.
    Disconnect {
        player_id: PlayerId,
        via: Option<PlayerSender>,
    },
    Start {
        requester: PlayerId,
        reply: oneshot::Sender<Result<RoomSnapshot, RoomError>>,
    },
    Restart {
        requester: PlayerId,
        reply: oneshot::Sender<Result<RoomSnapshot, RoomError>>,
    },
    Bank {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    ToggleGroupMute {
        requester: PlayerId,
        reply: oneshot::Sender<Result<bool, RoomError>>,
    },
    EndGame {
        requester: PlayerId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Info {
        reply: oneshot::Sender<RoomInfo>,
    },
    /// Cancel the timer, acknowledge, stop.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Room metadata plus scheduler state, for the registry and for tests.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub status: RoomStatus,
    pub player_count: usize,
    pub connected_count: usize,
    /// `true` exactly when the next automatic roll is scheduled.
    pub roll_timer_armed: bool,
    pub timer_metrics: TimerMetrics,
}

/// Handle to a running room actor.
///
/// Cheap to clone: it's just an `mpsc::Sender` wrapper. The registry holds
/// one per room, and callers clone it out so the registry lock is never
/// held while waiting on an actor.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomHandle").field("code", &self.code).finish()
    }
}

impl RoomHandle {
    /// Returns the room's code.
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Sends a command built around a fresh reply channel and waits for
    /// the answer.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    /// Adds a new player. Their events go to `sender`.
    pub async fn join(&self, name: Option<String>, sender: PlayerSender) -> Result<Joined, RoomError> {
        self.request(|reply| RoomCommand::Join { name, sender, reply }).await?
    }

    /// Resumes a player and routes their events to `sender` from now on.
    pub async fn reconnect(
        &self,
        player_id: PlayerId,
        secret: String,
        sender: PlayerSender,
    ) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Reconnect {
            player_id,
            secret,
            sender,
            reply,
        })
        .await?
    }

    /// Marks a player offline.
    pub async fn disconnect(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.send_disconnect(player_id, None).await
    }

    /// Marks a player offline if `via` is still their event channel.
    ///
    /// A socket that closes after its player resumed elsewhere must not
    /// knock the new socket offline.
    pub async fn disconnect_via(&self, player_id: PlayerId, via: PlayerSender) -> Result<(), RoomError> {
        self.send_disconnect(player_id, Some(via)).await
    }

    async fn send_disconnect(&self, player_id: PlayerId, via: Option<PlayerSender>) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Disconnect { player_id, via })
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    pub async fn start(&self, requester: PlayerId) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Start { requester, reply }).await?
    }

    pub async fn restart(&self, requester: PlayerId) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Restart { requester, reply }).await?
    }

    pub async fn bank(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Bank { player_id, reply }).await?
    }

    /// Returns the new mute state.
    pub async fn toggle_group_mute(&self, requester: PlayerId) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::ToggleGroupMute { requester, reply })
            .await?
    }

    /// Announces the end of a finished game. The registry destroys the
    /// room afterwards.
    pub async fn end_game(&self, requester: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::EndGame { requester, reply }).await?
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::Info { reply }).await
    }

    /// Stops the actor. Resolves once its timer is cancelled and the loop
    /// has exited.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Shutdown { reply }).await
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    game: BankGame,
    dice: Box<dyn DiceSource>,
    scheduler: RollScheduler,
    /// Per-player outbound channels. Only connected players have one.
    senders: HashMap<PlayerId, PlayerSender>,
    high_scores: Arc<Mutex<HighScoreTable>>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop until shutdown or until every handle is gone.
    ///
    /// `biased` makes a queued command win over a timer that is due at
    /// the same moment, so a bank that arrived first is applied before
    /// the roll looks at who is still active.
    async fn run(mut self) {
        tracing::info!(room = %self.game.code(), "room actor started");

        loop {
            tokio::select! {
                biased;
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle_command(cmd).await.is_break() {
                        break;
                    }
                }
                fired = self.scheduler.wait() => {
                    self.handle_timer(fired).await;
                }
            }
        }

        self.scheduler.cancel();
        tracing::info!(
            room = %self.game.code(),
            fired = self.scheduler.metrics().total_fired,
            late = self.scheduler.metrics().total_late,
            "room actor stopped"
        );
    }

    async fn handle_command(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        match cmd {
            RoomCommand::Join { name, sender, reply } => {
                let result = match self.game.join(name.as_deref()) {
                    Ok((credentials, step)) => {
                        self.senders.insert(credentials.player_id, sender);
                        self.apply(step).await;
                        Ok(Joined {
                            credentials,
                            snapshot: projector::snapshot(&self.game),
                        })
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            RoomCommand::Reconnect {
                player_id,
                secret,
                sender,
                reply,
            } => {
                let result = match self.game.reconnect(player_id, &secret) {
                    Ok(step) => {
                        self.senders.insert(player_id, sender);
                        self.apply(step).await;
                        Ok(projector::snapshot(&self.game))
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            RoomCommand::Disconnect { player_id, via } => {
                let stale = match (&via, self.senders.get(&player_id)) {
                    (Some(via), Some(current)) => !current.same_channel(via),
                    _ => false,
                };
                if stale {
                    tracing::debug!(room = %self.game.code(), %player_id, "ignoring disconnect from a replaced connection");
                    return ControlFlow::Continue(());
                }
                self.senders.remove(&player_id);
                let step = self.game.disconnect(player_id);
                self.apply(step).await;
            }
            RoomCommand::Start { requester, reply } => {
                let result = self.game.start(requester);
                let result = self.finish_with_snapshot(result).await;
                let _ = reply.send(result);
            }
            RoomCommand::Restart { requester, reply } => {
                let result = self.game.restart(requester);
                let result = self.finish_with_snapshot(result).await;
                let _ = reply.send(result);
            }
            RoomCommand::Bank { player_id, reply } => {
                let result = match self.game.bank(player_id) {
                    Ok(step) => {
                        self.apply(step).await;
                        Ok(())
                    }
                    Err(e) => {
                        tracing::debug!(room = %self.game.code(), %player_id, error = %e, "bank rejected");
                        Err(e)
                    }
                };
                let _ = reply.send(result);
            }
            RoomCommand::ToggleGroupMute { requester, reply } => {
                let result = match self.game.toggle_group_mute(requester) {
                    Ok((muted, step)) => {
                        self.apply(step).await;
                        Ok(muted)
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            RoomCommand::EndGame { requester, reply } => {
                let result = match self.game.end_game(requester) {
                    Ok(step) => {
                        self.apply(step).await;
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(projector::snapshot(&self.game));
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown { reply } => {
                self.scheduler.cancel();
                tracing::info!(room = %self.game.code(), "room shutting down");
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_timer(&mut self, fired: Fired) {
        tracing::trace!(room = %self.game.code(), kind = ?fired.kind, seq = fired.seq, "timer fired");
        let step = match fired.kind {
            TimerKind::Roll => self.game.roll(self.dice.as_mut()),
            TimerKind::NextRound => self.game.begin_next_round(),
        };
        self.apply(step).await;
    }

    async fn finish_with_snapshot(
        &mut self,
        result: Result<Step, RoomError>,
    ) -> Result<RoomSnapshot, RoomError> {
        let step = result?;
        self.apply(step).await;
        Ok(projector::snapshot(&self.game))
    }

    /// Applies a step: timer first, then events, then high scores.
    async fn apply(&mut self, step: Step) {
        match step.timer {
            TimerDirective::Keep => {}
            TimerDirective::ArmRoll(delay) => {
                self.scheduler.arm(TimerKind::Roll, delay);
            }
            TimerDirective::ArmNextRound(delay) => {
                self.scheduler.arm(TimerKind::NextRound, delay);
            }
            TimerDirective::Cancel => {
                self.scheduler.cancel();
            }
        }

        self.dispatch(step.events);

        if let Some(standings) = step.finished {
            let top = {
                let mut table = self.high_scores.lock().await;
                table.record(self.game.display_name(), &standings);
                table.top()
            };
            self.dispatch(vec![(Recipient::All, ServerEvent::HighScores { top })]);
        }
    }

    /// Dispatches events to the correct recipients.
    fn dispatch(&self, events: Vec<(Recipient, ServerEvent)>) {
        for (recipient, event) in events {
            match recipient {
                Recipient::All => {
                    for pid in self.senders.keys() {
                        self.send_to(*pid, event.clone());
                    }
                }
                Recipient::Player(pid) => self.send_to(pid, event),
            }
        }
    }

    /// Sends an event to a single player. Silently drops it if their
    /// handler is gone.
    fn send_to(&self, player_id: PlayerId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&player_id) {
            let _ = sender.send(event);
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.game.code().clone(),
            status: self.game.status(),
            player_count: self.game.players().len(),
            connected_count: self.game.players().iter().filter(|p| p.is_connected).count(),
            roll_timer_armed: self.scheduler.armed_kind() == Some(TimerKind::Roll),
            timer_metrics: self.scheduler.metrics().clone(),
        }
    }
}

/// Spawns a room actor for an already-built game and returns its handle.
///
/// `host` is the banker's id and event channel. `channel_size` bounds the
/// command queue; senders wait when it is full.
pub(crate) fn spawn_room(
    game: BankGame,
    dice: Box<dyn DiceSource>,
    host: (PlayerId, PlayerSender),
    high_scores: Arc<Mutex<HighScoreTable>>,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let code = game.code().clone();

    let mut senders = HashMap::new();
    senders.insert(host.0, host.1);

    let actor = RoomActor {
        game,
        dice,
        scheduler: RollScheduler::new(),
        senders,
        high_scores,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
