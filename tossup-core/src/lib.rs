//! tossup core - session, storage and REST access for the coin-flip game
//!
//! The backend owns every game, bet and balance. This crate keeps the local
//! login, decodes the backend's responses into typed values and exposes the
//! calls the game lifecycle needs behind the `GameBackend` trait.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, EntrySubmission};
pub use backend::{GameBackend, HttpBackend};
pub use config::ClientConfig;
pub use error::{Result, TossupError};
pub use session::{Identity, Session};
pub use types::{next_upcoming, CoinSide, Game, GameEntry, SideTotals, User};
