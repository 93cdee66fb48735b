//! Coin-flip game lifecycle
//!
//! Tracks the next upcoming game, collects local bets, submits them once just
//! before lock, animates the flip, polls for the result and settles payouts
//! locally so the outcome can be shown as soon as it is known.

pub mod clock;
pub mod config;
pub mod controller;
pub mod countdown;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod settlement;
pub mod slip;

pub use clock::{Clock, SystemClock, TokioClock};
pub use config::LifecycleConfig;
pub use controller::{ControllerHandle, ControllerView, GameController};
pub use countdown::{format_countdown, STARTING_NOW};
pub use error::{GameError, Result};
pub use history::{player_history, recent_results, results_strip, HistoryRow};
pub use lifecycle::{GameLifecycle, LifecycleSnapshot, Phase, RoundOutcome};
pub use settlement::{Payout, PlayerOutcome, Settlement, Wager};
pub use slip::{BetEntry, BetSlip, GateState, SubmissionGate};

use std::sync::Arc;
use tossup_core::{HttpBackend, Session};

/// Start a controller against the HTTP backend and the system clock.
pub fn start_live(
    backend: HttpBackend,
    config: LifecycleConfig,
) -> Result<(ControllerHandle, tokio::task::JoinHandle<()>)> {
    let session: Arc<Session> = backend.session().clone();
    let controller = GameController::new(Arc::new(backend), session, Arc::new(SystemClock), config)?;
    Ok(controller.spawn())
}
