//! Broadcast/view projector: what players are allowed to see.
//!
//! Secrets and transport ids never leave the room through here.

use std::cmp::Ordering;
use std::time::Duration;

use bankroll_protocol::{LeaderboardEntry, RollEvent, RoomSnapshot};

use crate::game::{BankGame, Player};
use crate::scoring::Dice;

/// Score descending, then name ascending.
fn standing_order(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name))
}

/// The leaderboard, best first.
pub fn leaderboard(players: &[Player]) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = players
        .iter()
        .map(|p| LeaderboardEntry {
            player_id: p.id,
            name: p.name.clone(),
            score: p.score,
            has_banked_this_round: p.has_banked,
            is_connected: p.is_connected,
            is_banker: p.is_banker,
        })
        .collect();
    entries.sort_by(standing_order);
    entries
}

/// Full player-visible state of a room.
pub fn snapshot(game: &BankGame) -> RoomSnapshot {
    RoomSnapshot {
        code: game.code().clone(),
        display_name: game.display_name().to_owned(),
        status: game.status(),
        round: game.round(),
        total_rounds: game.config().total_rounds,
        rounds_completed: game.rounds_completed(),
        roll_index: game.roll_index(),
        pot: game.pot(),
        phase: game.phase(),
        roll_interval_ms: game.config().roll_interval.as_millis() as u64,
        group_muted: game.group_muted(),
        active_players: game.active_count(),
        last_roll: game.last_roll().cloned(),
        players: leaderboard(game.players()),
    }
}

/// Payload for one roll. Call after the roll has been applied, so
/// `game.pot()` is the pot after scoring.
pub fn roll_event(
    game: &BankGame,
    dice: Dice,
    pot_before: u64,
    roller: Option<String>,
    next_roll_in: Option<Duration>,
) -> RollEvent {
    RollEvent {
        d1: dice.d1,
        d2: dice.d2,
        sum: dice.sum(),
        is_double: dice.is_double(),
        is_seven: dice.is_seven(),
        phase: game.phase(),
        round: game.round(),
        roll_index: game.roll_index(),
        pot_before,
        pot_after: game.pot(),
        roller,
        next_roll_in_ms: next_roll_in.map(|d| d.as_millis() as u64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoomConfig;
    use crate::dice::ScriptedDice;
    use bankroll_protocol::{Phase, RoomCode, RoomStatus};

    fn game_with_guests(names: &[&str]) -> BankGame {
        let code = RoomCode::normalize("proj").unwrap();
        let (mut game, _) = BankGame::new(code, "Proj", RoomConfig::default(), "Host");
        for name in names {
            game.join(Some(name)).unwrap();
        }
        game
    }

    #[test]
    fn test_leaderboard_sorts_score_desc_then_name_asc() {
        let mut players = game_with_guests(&["Zed", "Amy", "Bob"]).players().to_vec();
        players[0].score = 10; // Host
        players[1].score = 30; // Zed
        players[2].score = 10; // Amy
        players[3].score = 30; // Bob

        let names: Vec<String> = leaderboard(&players).into_iter().map(|e| e.name).collect();

        assert_eq!(names, vec!["Bob", "Zed", "Amy", "Host"]);
    }

    #[test]
    fn test_snapshot_has_no_secret() {
        let game = game_with_guests(&["Guest"]);
        let snap = snapshot(&game);
        let debug = format!("{snap:?}");

        assert!(!debug.to_lowercase().contains("secret"));
        assert_eq!(snap.players.len(), 2);
        assert_eq!(snap.status, RoomStatus::Lobby);
        assert_eq!(snap.display_name, "Proj");
        assert_eq!(snap.code.as_str(), "PROJ");
    }

    #[test]
    fn test_roll_event_reports_before_and_after() {
        let mut game = game_with_guests(&[]);
        let host = game.players()[0].id;
        game.start(host).unwrap();
        let mut dice = ScriptedDice::new([(2, 2), (2, 2), (2, 2), (2, 2)]);
        for _ in 0..4 {
            game.roll(&mut dice);
        }

        let last = game.last_roll().expect("rolled");
        assert_eq!(last.roll_index, 4);
        assert_eq!(last.phase, Phase::Danger);
        assert_eq!(last.pot_before, 12);
        assert_eq!(last.pot_after, 24);
        assert!(last.is_double);
        assert_eq!(last.next_roll_in_ms, Some(5000));
        assert_eq!(last.roller.as_deref(), Some("Host"));
    }
}
