//! Bank game rules and room lifecycle for Bankroll.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! [`BankGame`], its players' outbound channels and a single roll timer.
//!
//! # Key types
//!
//! - [`BankGame`]: the synchronous round/game state machine
//! - [`RoomRegistry`]: creates and destroys rooms by code
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomConfig`]: rounds, roll interval, roster cap, pauses
//! - [`DiceSource`]: where the dice come from

pub mod projector;

mod config;
mod dice;
mod error;
mod game;
mod highscores;
mod manager;
mod room;
mod scoring;

pub use config::{DEFAULT_PLAYER_NAME, DEFAULT_ROOM_NAME, RoomConfig};
pub use dice::{DiceSource, RandomDice, ScriptedDice};
pub use error::RoomError;
pub use game::{BankGame, Player, Step, TimerDirective};
pub use highscores::HighScoreTable;
pub use manager::{CreatedRoom, RoomRegistry};
pub use room::{Joined, PlayerSender, RoomHandle, RoomInfo};
pub use scoring::{Dice, SAFE_SEVEN_BONUS, Scored, apply_roll};
