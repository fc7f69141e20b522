//! Integration tests for room actors and the registry.
//!
//! Every test runs on a paused clock: whenever all tasks are idle, Tokio
//! jumps straight to the next timer deadline, so roll cadence is exact.

use std::time::Duration;

use bankroll_protocol::{ErrorCode, RoomCode, RoomStatus, RoundEndReason, ServerEvent};
use bankroll_room::{
    CreatedRoom, PlayerSender, RoomConfig, RoomError, RoomRegistry, ScriptedDice,
};
use tokio::sync::mpsc;
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

const INTERVAL: Duration = Duration::from_millis(1000);

fn config(rounds: u32) -> RoomConfig {
    RoomConfig {
        total_rounds: rounds,
        roll_interval: INTERVAL,
        ..RoomConfig::default()
    }
}

fn channel() -> (PlayerSender, mpsc::UnboundedReceiver<ServerEvent>) {
    mpsc::unbounded_channel()
}

fn code(raw: &str) -> RoomCode {
    RoomCode::normalize(raw).unwrap()
}

/// Creates a room with scripted dice and returns the host's event stream.
fn create(
    registry: &mut RoomRegistry,
    name: &str,
    rounds: u32,
    dice: Vec<(u8, u8)>,
) -> (CreatedRoom, mpsc::UnboundedReceiver<ServerEvent>) {
    let (tx, rx) = channel();
    let created = registry
        .create_room_with_dice(
            Some("Host"),
            Some(name),
            config(rounds),
            tx,
            Box::new(ScriptedDice::new(dice)),
        )
        .expect("room created");
    (created, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(120), rx.recv())
        .await
        .expect("event before timeout")
        .expect("channel open")
}

/// Skips events until one matches `pred`.
async fn wait_for(
    rx: &mut mpsc::UnboundedReceiver<ServerEvent>,
    pred: impl Fn(&ServerEvent) -> bool,
) -> ServerEvent {
    loop {
        let event = next_event(rx).await;
        if pred(&event) {
            return event;
        }
    }
}

fn is_roll(index: u32) -> impl Fn(&ServerEvent) -> bool {
    move |ev| matches!(ev, ServerEvent::RollResult(r) if r.roll_index == index)
}

// =========================================================================
// Registry
// =========================================================================

#[tokio::test]
async fn test_create_room_normalizes_and_rejects_duplicates() {
    let mut registry = RoomRegistry::default();
    let (created, _rx) = create(&mut registry, "Family Night", 3, vec![]);

    assert_eq!(created.snapshot.code, code("family night"));
    assert_eq!(created.snapshot.display_name, "Family Night");
    assert_eq!(created.snapshot.status, RoomStatus::Lobby);
    assert!(created.snapshot.players[0].is_banker);

    let (tx, _rx2) = channel();
    let result = registry.create_room(Some("Other"), Some("  family   NIGHT "), config(3), tx);

    assert!(matches!(result, Err(RoomError::NameTaken(_))));
    assert_eq!(registry.room_count(), 1);
}

#[tokio::test]
async fn test_create_room_without_player_name_rejected() {
    let mut registry = RoomRegistry::default();
    let (tx, _rx) = channel();

    let err = registry
        .create_room(Some("   "), Some("Table"), config(3), tx)
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::MissingPlayerName));
    assert_eq!(registry.room_count(), 0);
}

#[tokio::test]
async fn test_create_room_blank_name_uses_default() {
    let mut registry = RoomRegistry::default();
    let (tx, _rx) = channel();

    let created = registry.create_room(Some("Host"), None, config(3), tx).unwrap();

    assert_eq!(created.snapshot.display_name, "BANK GAME");
    assert!(registry.lookup("bank game").is_ok());
}

#[tokio::test]
async fn test_lookup_missing_and_unknown_codes() {
    let registry = RoomRegistry::default();

    assert!(matches!(registry.lookup("  "), Err(RoomError::MissingRoomCode)));
    assert!(matches!(registry.lookup("nowhere"), Err(RoomError::NotFound(_))));
}

#[tokio::test]
async fn test_join_room_case_insensitive_and_defaults_name() {
    let mut registry = RoomRegistry::default();
    let (_created, mut host_rx) = create(&mut registry, "Table", 3, vec![]);

    let (tx, _rx) = channel();
    let joined = registry.join_room("TABLE", None, tx).await.unwrap();

    assert_eq!(joined.snapshot.players.len(), 2);
    let guest = joined
        .snapshot
        .players
        .iter()
        .find(|p| p.player_id == joined.credentials.player_id)
        .unwrap();
    assert_eq!(guest.name, "Player");
    assert!(!guest.is_banker);

    // The host hears about the newcomer.
    let event = next_event(&mut host_rx).await;
    assert!(matches!(event, ServerEvent::RoomState(s) if s.players.len() == 2));
}

#[tokio::test]
async fn test_join_after_start_rejected() {
    let mut registry = RoomRegistry::default();
    let (created, _rx) = create(&mut registry, "Table", 3, vec![]);
    created.handle.start(created.credentials.player_id).await.unwrap();

    let (tx, _rx2) = channel();
    let err = registry.join_room("table", Some("Late".into()), tx).await.unwrap_err();

    assert!(matches!(err, RoomError::GameInProgress(_)));
    assert_eq!(err.code(), Some(ErrorCode::GameAlreadyStarted));
}

// =========================================================================
// Lifecycle and timer slot
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_start_arms_roll_and_rolls_on_cadence() {
    let mut registry = RoomRegistry::default();
    let (created, mut rx) = create(&mut registry, "Table", 3, vec![(2, 3)]);
    let host = created.credentials.player_id;

    let start = Instant::now();
    let snapshot = created.handle.start(host).await.unwrap();
    assert_eq!(snapshot.status, RoomStatus::InRound);

    let info = created.handle.info().await.unwrap();
    assert!(info.roll_timer_armed);

    wait_for(&mut rx, is_roll(1)).await;
    assert_eq!(start.elapsed(), INTERVAL);

    wait_for(&mut rx, is_roll(2)).await;
    assert_eq!(start.elapsed(), INTERVAL * 2);
}

#[tokio::test(start_paused = true)]
async fn test_non_banker_cannot_start() {
    let mut registry = RoomRegistry::default();
    let (created, _rx) = create(&mut registry, "Table", 3, vec![]);
    let (tx, _guest_rx) = channel();
    let guest = registry.join_room("table", Some("Guest".into()), tx).await.unwrap();

    let err = created.handle.start(guest.credentials.player_id).await.unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::NotBanker));
    let info = created.handle.info().await.unwrap();
    assert_eq!(info.status, RoomStatus::Lobby);
    assert!(!info.roll_timer_armed);
}

#[tokio::test(start_paused = true)]
async fn test_danger_seven_pauses_between_rounds() {
    let mut registry = RoomRegistry::default();
    let (created, mut rx) = create(&mut registry, "Table", 2, vec![(1, 1), (1, 1), (1, 1), (3, 4)]);
    let host = created.credentials.player_id;
    created.handle.start(host).await.unwrap();

    let ended = wait_for(&mut rx, |ev| matches!(ev, ServerEvent::RoundEnded { .. })).await;
    match ended {
        ServerEvent::RoundEnded {
            round,
            reason,
            pot,
            next_round_delay_ms,
        } => {
            assert_eq!(round, 1);
            assert_eq!(reason, RoundEndReason::Seven);
            assert_eq!(pot, 0, "a danger seven wipes the pot");
            assert_eq!(next_round_delay_ms, Some(3000));
        }
        other => panic!("expected round_ended, got {other:?}"),
    }

    let info = created.handle.info().await.unwrap();
    assert_eq!(info.status, RoomStatus::BetweenRounds);
    assert!(!info.roll_timer_armed, "no roll may fire during the pause");

    let paused_at = Instant::now();
    wait_for(&mut rx, |ev| {
        matches!(ev, ServerEvent::RoomState(s) if s.status == RoomStatus::InRound && s.round == 2)
    })
    .await;
    assert_eq!(paused_at.elapsed(), Duration::from_secs(3));

    let snapshot = created.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.pot, 0);
    assert_eq!(snapshot.roll_index, 0);
    assert!(snapshot.players.iter().all(|p| !p.has_banked_this_round));
}

#[tokio::test(start_paused = true)]
async fn test_bank_between_rounds_is_silent_failure() {
    let mut registry = RoomRegistry::default();
    let (created, mut rx) = create(&mut registry, "Table", 2, vec![(1, 1), (1, 1), (1, 1), (3, 4)]);
    let host = created.credentials.player_id;
    created.handle.start(host).await.unwrap();
    wait_for(&mut rx, |ev| matches!(ev, ServerEvent::RoundEnded { .. })).await;

    let err = created.handle.bank(host).await.unwrap_err();

    assert!(matches!(err, RoomError::NotInRound));
    assert_eq!(err.code(), None);
}

#[tokio::test(start_paused = true)]
async fn test_disconnected_player_no_longer_blocks_round_end() {
    let mut registry = RoomRegistry::default();
    let (created, mut rx) = create(&mut registry, "Table", 2, vec![(2, 3)]);
    let host = created.credentials.player_id;
    let (tx, _guest_rx) = channel();
    let guest = registry.join_room("table", Some("Guest".into()), tx).await.unwrap();

    created.handle.start(host).await.unwrap();
    wait_for(&mut rx, is_roll(1)).await;

    created.handle.disconnect(guest.credentials.player_id).await.unwrap();
    created.handle.bank(host).await.unwrap();

    // Everyone still connected has banked, and the all-banked pause is zero.
    let snapshot = created.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.status, RoomStatus::InRound);
    assert_eq!(snapshot.round, 2);
    let host_entry = snapshot.players.iter().find(|p| p.player_id == host).unwrap();
    assert_eq!(host_entry.score, 5);
    assert!(created.handle.info().await.unwrap().roll_timer_armed);
}

#[tokio::test(start_paused = true)]
async fn test_double_bank_credits_once() {
    let mut registry = RoomRegistry::default();
    let (created, mut rx) = create(&mut registry, "Table", 2, vec![(2, 3)]);
    let host = created.credentials.player_id;
    let (tx, _guest_rx) = channel();
    registry.join_room("table", Some("Guest".into()), tx).await.unwrap();

    created.handle.start(host).await.unwrap();
    wait_for(&mut rx, is_roll(1)).await;

    created.handle.bank(host).await.unwrap();
    let second = created.handle.bank(host).await;

    assert!(matches!(second, Err(RoomError::AlreadyBanked(_))));
    let snapshot = created.handle.snapshot().await.unwrap();
    let host_entry = snapshot.players.iter().find(|p| p.player_id == host).unwrap();
    assert_eq!(host_entry.score, 5);
}

#[tokio::test(start_paused = true)]
async fn test_restart_mid_round_resets_and_keeps_one_roll_timer() {
    let mut registry = RoomRegistry::default();
    let (created, mut rx) = create(&mut registry, "Table", 3, vec![(2, 3)]);
    let host = created.credentials.player_id;
    let (tx, _guest_rx) = channel();
    let guest = registry
        .join_room("table", Some("Guest".into()), tx)
        .await
        .unwrap()
        .credentials
        .player_id;

    created.handle.start(host).await.unwrap();
    wait_for(&mut rx, is_roll(2)).await;
    created.handle.bank(guest).await.unwrap();

    let snapshot = created.handle.restart(host).await.unwrap();
    let restarted_at = Instant::now();

    assert_eq!(snapshot.status, RoomStatus::InRound);
    assert_eq!(snapshot.round, 1);
    assert_eq!(snapshot.pot, 0);
    assert_eq!(snapshot.roll_index, 0);
    assert!(snapshot.players.iter().all(|p| p.score == 0 && !p.has_banked_this_round));
    assert!(created.handle.info().await.unwrap().roll_timer_armed);

    // The pre-restart cadence is gone: the first roll lands a full
    // interval after the restart.
    wait_for(&mut rx, is_roll(1)).await;
    assert_eq!(restarted_at.elapsed(), INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn test_restart_between_rounds_replaces_next_round_timer() {
    let mut registry = RoomRegistry::default();
    let (created, mut rx) = create(&mut registry, "Table", 2, vec![(1, 1), (1, 1), (1, 1), (3, 4)]);
    let host = created.credentials.player_id;
    created.handle.start(host).await.unwrap();
    wait_for(&mut rx, |ev| matches!(ev, ServerEvent::RoundEnded { .. })).await;
    assert_eq!(created.handle.info().await.unwrap().status, RoomStatus::BetweenRounds);

    let snapshot = created.handle.restart(host).await.unwrap();
    let restarted_at = Instant::now();
    assert_eq!(snapshot.status, RoomStatus::InRound);
    assert_eq!(snapshot.round, 1);
    assert_eq!(snapshot.pot, 0);
    assert_eq!(snapshot.roll_index, 0);
    assert!(created.handle.info().await.unwrap().roll_timer_armed);

    wait_for(&mut rx, is_roll(1)).await;
    assert_eq!(restarted_at.elapsed(), INTERVAL);

    // Past the point where the 3 s pause would have ended: still round 1,
    // still rolling.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let snapshot = created.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.status, RoomStatus::InRound);
    assert_eq!(snapshot.round, 1);
    assert_eq!(snapshot.roll_index, 3);
    assert!(created.handle.info().await.unwrap().roll_timer_armed);
}

// =========================================================================
// Sessions
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_reconnect_requires_matching_secret() {
    let mut registry = RoomRegistry::default();
    let (created, _rx) = create(&mut registry, "Table", 3, vec![]);
    let host = created.credentials.player_id;
    created.handle.disconnect(host).await.unwrap();

    let (tx, _rx2) = channel();
    let err = created
        .handle
        .reconnect(host, "not-the-secret".into(), tx)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidSession));

    let (tx, mut new_rx) = channel();
    let snapshot = created
        .handle
        .reconnect(host, created.credentials.secret.as_str().to_owned(), tx)
        .await
        .unwrap();

    assert!(snapshot.players[0].is_connected);
    assert!(snapshot.players[0].is_banker);
    let event = next_event(&mut new_rx).await;
    assert!(matches!(event, ServerEvent::RoomState(_)));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_mid_round_replays_last_roll() {
    let mut registry = RoomRegistry::default();
    let (created, mut rx) = create(&mut registry, "Table", 3, vec![(6, 5)]);
    let host = created.credentials.player_id;
    let (tx, _guest_rx) = channel();
    registry.join_room("table", Some("Guest".into()), tx).await.unwrap();

    created.handle.start(host).await.unwrap();
    wait_for(&mut rx, is_roll(1)).await;
    created.handle.disconnect(host).await.unwrap();

    let (tx, mut new_rx) = channel();
    created
        .handle
        .reconnect(host, created.credentials.secret.as_str().to_owned(), tx)
        .await
        .unwrap();

    let replay = wait_for(&mut new_rx, is_roll(1)).await;
    match replay {
        ServerEvent::RollResult(roll) => {
            assert_eq!(roll.sum, 11);
            assert_eq!(roll.pot_after, 11);
        }
        other => panic!("expected roll_result, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_from_replaced_channel_is_ignored() {
    let mut registry = RoomRegistry::default();
    let (old_tx, _old_rx) = channel();
    let created = registry
        .create_room(Some("Host"), Some("Table"), config(3), old_tx.clone())
        .unwrap();
    let host = created.credentials.player_id;

    let (new_tx, _new_rx) = channel();
    created
        .handle
        .reconnect(host, created.credentials.secret.as_str().to_owned(), new_tx.clone())
        .await
        .unwrap();

    // The first socket closes late.
    created.handle.disconnect_via(host, old_tx).await.unwrap();
    let snapshot = created.handle.snapshot().await.unwrap();
    assert!(snapshot.players[0].is_connected);

    created.handle.disconnect_via(host, new_tx).await.unwrap();
    let snapshot = created.handle.snapshot().await.unwrap();
    assert!(!snapshot.players[0].is_connected);
}

// =========================================================================
// Full game, high scores, teardown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_full_game_records_high_scores_and_ends() {
    let mut registry = RoomRegistry::default();
    let (created, mut rx) = create(&mut registry, "Finale", 1, vec![(1, 1), (1, 1), (1, 1), (2, 2)]);
    let host = created.credentials.player_id;
    created.handle.start(host).await.unwrap();

    // Safe: 2, 4, 6. Danger double: 12.
    wait_for(&mut rx, is_roll(4)).await;
    created.handle.bank(host).await.unwrap();

    let over = wait_for(&mut rx, |ev| matches!(ev, ServerEvent::GameOver { .. })).await;
    match over {
        ServerEvent::GameOver { final_standings } => {
            assert_eq!(final_standings.len(), 1);
            assert_eq!(final_standings[0].score, 12);
        }
        other => panic!("expected game_over, got {other:?}"),
    }
    let scores = wait_for(&mut rx, |ev| matches!(ev, ServerEvent::HighScores { .. })).await;
    assert!(matches!(scores, ServerEvent::HighScores { top } if top[0].score == 12 && top[0].room == "Finale"));

    let info = created.handle.info().await.unwrap();
    assert_eq!(info.status, RoomStatus::Finished);
    assert!(!info.roll_timer_armed);
    assert_eq!(registry.high_scores().lock().await.top().len(), 1);

    registry.end_game(&code("finale"), host).await.unwrap();

    wait_for(&mut rx, |ev| matches!(ev, ServerEvent::GameEnded { .. })).await;
    assert_eq!(registry.room_count(), 0);
    assert!(matches!(registry.lookup("finale"), Err(RoomError::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn test_end_game_before_finish_rejected() {
    let mut registry = RoomRegistry::default();
    let (created, _rx) = create(&mut registry, "Table", 3, vec![]);
    let host = created.credentials.player_id;

    let err = registry.end_game(&code("table"), host).await.unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::GameNotFinished));
    assert_eq!(registry.room_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_room_cancels_timer_before_removal() {
    let mut registry = RoomRegistry::default();
    let (created, mut rx) = create(&mut registry, "Table", 3, vec![]);
    created.handle.start(created.credentials.player_id).await.unwrap();

    registry.destroy_room(&code("table")).await.unwrap();

    assert_eq!(registry.room_count(), 0);
    assert!(matches!(created.handle.info().await, Err(RoomError::Unavailable(_))));

    // The actor dropped its senders; nothing rolled on the way out.
    while let Some(event) = rx.recv().await {
        assert!(!matches!(event, ServerEvent::RollResult(_)), "rolled after destroy");
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_all_clears_registry() {
    let mut registry = RoomRegistry::default();
    let (a, _rx_a) = create(&mut registry, "One", 3, vec![]);
    let (_b, _rx_b) = create(&mut registry, "Two", 3, vec![]);
    a.handle.start(a.credentials.player_id).await.unwrap();

    registry.shutdown_all().await;

    assert_eq!(registry.room_count(), 0);
    assert!(registry.room_codes().is_empty());
    assert!(a.handle.snapshot().await.is_err());
}
