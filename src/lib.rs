//! Krakenling economy — the progression engine behind the studio site's idle game.
//!
//! Helpers (agents) earn krakenlings over time, unlockables are bought once,
//! therapies (minigames) are replayed on a cooldown and missions are claimed
//! for bonus rewards. Everything here is pure data and pure functions except
//! [`session::Session`], which owns one player's collections and writes them
//! through a [`store::KeyValueStore`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod logic;
pub mod missions;
pub mod progress;
pub mod save;
pub mod session;
mod simulator;
pub mod state;
pub mod store;
pub mod time;

pub use config::EconomyConfig;
pub use error::{ConfigError, StoreError};
pub use session::{Session, SessionEvent};
pub use store::{KeyValueStore, MemoryStore};
