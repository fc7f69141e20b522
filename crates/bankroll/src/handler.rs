//! Per-connection handler: decode, authorize, route, reply.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Loop: receive envelopes → dispatch the request → send a `Response`
//!   2. Meanwhile: forward room events from the player's channel
//!   3. On close or idle timeout: unbind and mark the player offline

use std::sync::Arc;

use bankroll_protocol::{
    ClientRequest, Codec, Envelope, ErrorCode, Payload, PlayerId, Reply, RoomCode, ServerEvent,
};
use bankroll_room::{PlayerSender, RoomError, RoomHandle};
use bankroll_transport::{Connection, ConnectionId, WebSocketConnection};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::BankrollError;
use crate::server::ServerState;

/// Just enough of an envelope to find a request id when the full decode
/// failed, so the client still gets a correlated `invalid_message`.
#[derive(Deserialize)]
struct RequestProbe {
    payload: ProbePayload,
}

#[derive(Deserialize)]
#[serde(tag = "type", content = "data")]
enum ProbePayload {
    Request { id: u64 },
}

/// Writes envelopes to one connection with its own sequence counter.
struct Outbound<'a, C: Codec> {
    conn: &'a WebSocketConnection,
    state: &'a ServerState<C>,
    seq: u64,
}

impl<C: Codec> Outbound<'_, C> {
    async fn send(&mut self, payload: Payload) -> Result<(), BankrollError> {
        let envelope = Envelope {
            seq: self.seq,
            timestamp: self.state.uptime_ms(),
            payload,
        };
        self.seq += 1;
        let bytes = self.state.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn reply(&mut self, id: u64, body: Reply) -> Result<(), BankrollError> {
        self.send(Payload::Response { id, body }).await
    }

    async fn event(&mut self, event: ServerEvent) -> Result<(), BankrollError> {
        self.send(Payload::Event(event)).await
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), BankrollError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // Rooms push events here; the sender is cloned into every room this
    // connection creates, joins, or resumes.
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let mut out = Outbound {
        conn: &conn,
        state: state.as_ref(),
        seq: 1,
    };

    let idle_timeout = state.config.idle_timeout;
    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);

    let result = loop {
        tokio::select! {
            frame = conn.recv() => {
                let data = match frame {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break Ok(());
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break Err(e.into());
                    }
                };
                idle.as_mut().reset(Instant::now() + idle_timeout);
                if data.is_empty() {
                    continue;
                }
                if let Err(e) = handle_frame(&state, conn_id, &events_tx, &mut out, &data).await {
                    break Err(e);
                }
            }
            Some(event) = events_rx.recv() => {
                let ended = match &event {
                    ServerEvent::GameEnded { room_code } => Some(room_code.clone()),
                    _ => None,
                };
                if let Err(e) = out.event(event).await {
                    break Err(e);
                }
                if let Some(code) = ended {
                    release_binding(&state, conn_id, &code).await;
                }
            }
            () = &mut idle => {
                tracing::info!(%conn_id, timeout = ?idle_timeout, "connection idle, closing");
                let _ = conn.close().await;
                break Ok(());
            }
        }
    };

    disconnect(&state, conn_id, &events_tx).await;
    result
}

/// Decodes one frame and answers it.
async fn handle_frame<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    events: &PlayerSender,
    out: &mut Outbound<'_, C>,
    data: &[u8],
) -> Result<(), BankrollError> {
    let envelope: Envelope = match state.codec.decode(data) {
        Ok(env) => env,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
            return match state.codec.decode::<RequestProbe>(data) {
                Ok(RequestProbe {
                    payload: ProbePayload::Request { id },
                }) => out.reply(id, Reply::error(ErrorCode::InvalidMessage)).await,
                Err(_) => {
                    out.event(ServerEvent::ErrorMessage {
                        text: "malformed message".to_string(),
                    })
                    .await
                }
            };
        }
    };

    let (id, request) = match envelope.payload {
        Payload::Request { id, body } => (id, body),
        Payload::Response { .. } | Payload::Event(_) => {
            tracing::debug!(%conn_id, "ignoring non-request payload from client");
            return out
                .event(ServerEvent::ErrorMessage {
                    text: "only requests are accepted".to_string(),
                })
                .await;
        }
    };

    // A failed bank is always a bare `{ "ok": false }`.
    let is_bank = matches!(request, ClientRequest::Bank { .. });
    let reply = match dispatch(state, conn_id, events, request).await {
        Ok(reply) => reply,
        Err(e) => {
            match &e {
                BankrollError::Room(RoomError::Unavailable(code)) => {
                    tracing::error!(%conn_id, room = %code, "room actor unavailable");
                }
                _ => tracing::debug!(%conn_id, error = %e, "request rejected"),
            }
            Reply::failure(if is_bank { None } else { e.wire_code() })
        }
    };
    out.reply(id, reply).await
}

/// Routes one request and builds the success reply.
async fn dispatch<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    events: &PlayerSender,
    request: ClientRequest,
) -> Result<Reply, BankrollError> {
    match request {
        ClientRequest::CreateRoom {
            player_name,
            room_name,
            total_rounds,
            roll_interval_ms,
        } => {
            let created = {
                let mut rooms = state.rooms.lock().await;
                let config = rooms
                    .defaults()
                    .clone()
                    .with_overrides(total_rounds, roll_interval_ms);
                rooms.create_room(
                    player_name.as_deref(),
                    room_name.as_deref(),
                    config,
                    events.clone(),
                )?
            };
            let player_id = created.credentials.player_id;
            bind(state, conn_id, events, created.handle.code().clone(), player_id).await;
            Ok(Reply::ok()
                .with_room(created.snapshot)
                .with_credentials(player_id, created.credentials.secret.as_str().to_owned()))
        }

        ClientRequest::JoinRoom {
            room_code,
            player_name,
        } => {
            let handle = lookup(state, room_code.as_deref()).await?;
            let joined = handle.join(player_name, events.clone()).await?;
            let player_id = joined.credentials.player_id;
            bind(state, conn_id, events, handle.code().clone(), player_id).await;
            Ok(Reply::ok()
                .with_room(joined.snapshot)
                .with_credentials(player_id, joined.credentials.secret.as_str().to_owned()))
        }

        ClientRequest::Reconnect {
            room_code,
            player_id,
            secret,
        } => {
            let room_code = room_code.filter(|raw| !raw.trim().is_empty());
            let (Some(room_code), Some(player_id), Some(secret)) = (room_code, player_id, secret)
            else {
                return Err(RoomError::InvalidSession.into());
            };
            let handle = lookup(state, Some(room_code.as_str())).await?;
            let snapshot = handle.reconnect(player_id, secret, events.clone()).await?;
            bind(state, conn_id, events, handle.code().clone(), player_id).await;
            let mut reply = Reply::ok().with_room(snapshot);
            reply.player_id = Some(player_id);
            Ok(reply)
        }

        ClientRequest::StartGame {
            room_code,
            player_id,
        } => {
            let handle = authorized(state, conn_id, &room_code, player_id).await?;
            let snapshot = handle.start(player_id).await?;
            Ok(Reply::ok().with_room(snapshot))
        }

        ClientRequest::RestartGame {
            room_code,
            player_id,
        } => {
            let handle = authorized(state, conn_id, &room_code, player_id).await?;
            let snapshot = handle.restart(player_id).await?;
            Ok(Reply::ok().with_room(snapshot))
        }

        ClientRequest::Bank {
            room_code,
            player_id,
        } => {
            let handle = authorized(state, conn_id, &room_code, player_id).await?;
            handle.bank(player_id).await?;
            Ok(Reply::ok())
        }

        ClientRequest::EndGame { room_code } => {
            let code = normalize(&room_code)?;
            let requester = member(state, conn_id, &code).await?;
            // Destruction is the one place the registry lock is held across
            // an actor round-trip: the code must not be reused before the
            // timer is cancelled.
            state.rooms.lock().await.end_game(&code, requester).await?;
            Ok(Reply::ok())
        }

        ClientRequest::ToggleGroupMute { room_code } => {
            let code = normalize(&room_code)?;
            let requester = member(state, conn_id, &code).await?;
            let handle = lookup(state, Some(code.as_str())).await?;
            handle.toggle_group_mute(requester).await?;
            Ok(Reply::ok())
        }

        ClientRequest::Heartbeat { client_time } => {
            tracing::trace!(%conn_id, client_time, "heartbeat");
            Ok(Reply::ok().with_server_time(state.uptime_ms()))
        }
    }
}

fn normalize(raw: &str) -> Result<RoomCode, RoomError> {
    RoomCode::normalize(raw).ok_or(RoomError::MissingRoomCode)
}

/// Clones a room handle out of the registry. The lock is released before
/// the caller talks to the actor.
async fn lookup<C: Codec>(state: &ServerState<C>, raw: Option<&str>) -> Result<RoomHandle, RoomError> {
    state.rooms.lock().await.lookup(raw.unwrap_or_default())
}

/// Checks that this connection speaks for `player_id` in the room, then
/// returns the room.
async fn authorized<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    raw: &str,
    player_id: PlayerId,
) -> Result<RoomHandle, BankrollError> {
    let code = normalize(raw)?;
    state.sessions.lock().await.authorize(conn_id, &code, player_id)?;
    Ok(lookup(state, Some(code.as_str())).await?)
}

/// The player this connection is bound to in `code`.
async fn member<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    code: &RoomCode,
) -> Result<PlayerId, BankrollError> {
    let sessions = state.sessions.lock().await;
    Ok(sessions.member_of(conn_id, code)?.player_id)
}

/// Binds the connection after a create, join, or reconnect. A different
/// player this connection was speaking for goes offline in their room.
async fn bind<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    events: &PlayerSender,
    code: RoomCode,
    player_id: PlayerId,
) {
    let outcome = state.sessions.lock().await.bind(conn_id, code, player_id);

    if let Some(old) = outcome.displaced_connection {
        tracing::debug!(%conn_id, displaced = %old, %player_id, "took over player from another connection");
    }
    if let Some(previous) = outcome.previous_binding {
        if previous.player_id != player_id {
            mark_offline(state, &previous.room, previous.player_id, events).await;
        }
    }
}

/// Drops the binding once its room has ended.
async fn release_binding<C: Codec>(state: &ServerState<C>, conn_id: ConnectionId, code: &RoomCode) {
    let mut sessions = state.sessions.lock().await;
    if sessions.get(conn_id).is_some_and(|s| &s.room == code) {
        sessions.unbind(conn_id);
    }
}

/// Cleanup when the socket is gone.
async fn disconnect<C: Codec>(state: &ServerState<C>, conn_id: ConnectionId, events: &PlayerSender) {
    let session = state.sessions.lock().await.unbind(conn_id);
    if let Some(session) = session {
        mark_offline(state, &session.room, session.player_id, events).await;
    }
}

async fn mark_offline<C: Codec>(
    state: &ServerState<C>,
    code: &RoomCode,
    player_id: PlayerId,
    events: &PlayerSender,
) {
    let handle = state.rooms.lock().await.handle(code);
    if let Some(handle) = handle {
        if let Err(e) = handle.disconnect_via(player_id, events.clone()).await {
            tracing::debug!(room = %code, %player_id, error = %e, "disconnect not delivered");
        }
    }
}
