//! Process-wide best scores.
//!
//! In memory only; the table starts empty on every boot.

use bankroll_protocol::{HighScoreEntry, LeaderboardEntry};

/// How many entries the table keeps by default.
pub const DEFAULT_CAPACITY: usize = 5;

/// Top-N scores across every finished game.
#[derive(Debug, Clone)]
pub struct HighScoreTable {
    entries: Vec<HighScoreEntry>,
    capacity: usize,
}

impl Default for HighScoreTable {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl HighScoreTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Merges a finished game's standings into the table.
    pub fn record(&mut self, room: &str, standings: &[LeaderboardEntry]) {
        self.entries.extend(standings.iter().map(|s| HighScoreEntry {
            name: s.name.clone(),
            score: s.score,
            room: room.to_owned(),
        }));
        self.entries
            .sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        self.entries.truncate(self.capacity);
    }

    /// Best first.
    pub fn top(&self) -> Vec<HighScoreEntry> {
        self.entries.clone()
    }
}
