//! The per-game state machine: `Timer -> Flipping -> Result -> next game`.
//!
//! `GameLifecycle` never sleeps and never talks to the network. Every input
//! (a countdown tick, a finished request, a timer firing) arrives as an
//! [`Event`], and everything it wants done comes back as [`Effect`]s for the
//! driver to carry out. Events that belong to a game the machine has since
//! left behind are recognised by their epoch and ignored.

use crate::config::LifecycleConfig;
use crate::countdown::{format_countdown, STARTING_NOW};
use crate::error::{GameError, Result};
use crate::settlement::{Settlement, Wager};
use crate::slip::{BetEntry, BetSlip, GateState, SubmissionGate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tossup_core::{next_upcoming, CoinSide, Game};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No upcoming game known.
    Idle,
    /// Betting open, counting down to lock.
    Timer,
    /// Locked; animation running, then polling for the result.
    Flipping,
    /// Result known and on display.
    Result,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    Animation,
    Poll,
    Dwell,
}

#[derive(Debug)]
pub enum Event {
    Tick {
        now: DateTime<Utc>,
    },
    /// Periodic prompt to look for the next game.
    RefreshDue,
    GamesFetched {
        now: DateTime<Utc>,
        result: tossup_core::Result<Vec<Game>>,
    },
    SubmitFinished {
        epoch: u64,
        now: DateTime<Utc>,
        result: tossup_core::Result<()>,
    },
    TimerFired {
        epoch: u64,
        kind: TimerKind,
    },
    PollFinished {
        epoch: u64,
        result: tossup_core::Result<Game>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchGames,
    Submit {
        epoch: u64,
        game_id: String,
        entries: Vec<BetEntry>,
    },
    Schedule {
        epoch: u64,
        kind: TimerKind,
        after: Duration,
    },
    /// Abort every outstanding game timer.
    CancelTimers,
    PollResult {
        epoch: u64,
        game_id: String,
    },
    RefreshPoints,
    RefreshHistory,
}

/// A finished round as shown to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub game_id: String,
    pub result: CoinSide,
    pub total_pool: u64,
    pub settlement: Settlement,
}

impl RoundOutcome {
    pub fn headline(&self) -> String {
        format!("{} Win!!!", self.result)
    }
}

/// Read-only view of the machine for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleSnapshot {
    pub phase: Phase,
    pub epoch: u64,
    pub game: Option<Game>,
    pub countdown: String,
    pub betting_open: bool,
    pub entries: Vec<BetEntry>,
    pub pending_total: u64,
    pub submission: GateState,
    pub poll_attempts: u32,
    pub outcome: Option<RoundOutcome>,
}

impl Default for LifecycleSnapshot {
    fn default() -> Self {
        GameLifecycle::new(LifecycleConfig::default()).snapshot()
    }
}

pub struct GameLifecycle {
    config: LifecycleConfig,
    guard: chrono::Duration,
    phase: Phase,
    epoch: u64,
    game: Option<Game>,
    slip: BetSlip,
    gate: SubmissionGate,
    locked: bool,
    countdown: String,
    poll_attempts: u32,
    outcome: Option<RoundOutcome>,
    fetch_in_flight: bool,
}

impl GameLifecycle {
    pub fn new(config: LifecycleConfig) -> Self {
        let guard =
            chrono::Duration::from_std(config.submit_guard).unwrap_or_else(|_| chrono::Duration::zero());

        Self {
            config,
            guard,
            phase: Phase::Idle,
            epoch: 0,
            game: None,
            slip: BetSlip::new(),
            gate: SubmissionGate::new(),
            locked: false,
            countdown: String::new(),
            poll_attempts: 0,
            outcome: None,
            fetch_in_flight: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn countdown(&self) -> &str {
        &self.countdown
    }

    pub fn entries(&self) -> &[BetEntry] {
        self.slip.entries()
    }

    pub fn outcome(&self) -> Option<&RoundOutcome> {
        self.outcome.as_ref()
    }

    pub fn betting_open(&self) -> bool {
        self.phase == Phase::Timer && !self.locked && self.gate.is_open()
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        LifecycleSnapshot {
            phase: self.phase,
            epoch: self.epoch,
            game: self.game.clone(),
            countdown: self.countdown.clone(),
            betting_open: self.betting_open(),
            entries: self.slip.entries().to_vec(),
            pending_total: self.slip.total(),
            submission: self.gate.state(),
            poll_attempts: self.poll_attempts,
            outcome: self.outcome.clone(),
        }
    }

    /// Add a stake to the current game's slip.
    pub fn place_bet(&mut self, side: CoinSide, amount: u64, now: DateTime<Utc>) -> Result<BetEntry> {
        let game_id = match (&self.phase, &self.game) {
            (Phase::Idle, _) | (_, None) => return Err(GameError::NoActiveGame),
            (_, Some(game)) => game.id.clone(),
        };

        let before_lock = self
            .game
            .as_ref()
            .map_or(false, |game| game.starts_after(now));
        if !self.betting_open() || !before_lock {
            return Err(GameError::BettingClosed(game_id));
        }

        Ok(self.slip.add(side, amount, now)?.clone())
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Tick { now } => {
                if self.phase == Phase::Timer {
                    self.advance(now)
                } else {
                    Vec::new()
                }
            }
            Event::RefreshDue => match self.phase {
                Phase::Idle | Phase::Timer => self.fetch().into_iter().collect(),
                Phase::Flipping | Phase::Result => Vec::new(),
            },
            Event::GamesFetched { now, result } => self.on_games(now, result),
            Event::SubmitFinished { epoch, now, result } => {
                if epoch != self.epoch || self.phase != Phase::Timer {
                    tracing::debug!("Ignoring stale submission result for epoch {}", epoch);
                    return Vec::new();
                }
                self.on_submitted(now, result)
            }
            Event::TimerFired { epoch, kind } => {
                if epoch != self.epoch {
                    return Vec::new();
                }
                self.on_timer(kind)
            }
            Event::PollFinished { epoch, result } => {
                if epoch != self.epoch || self.phase != Phase::Flipping {
                    return Vec::new();
                }
                self.on_poll(result)
            }
        }
    }

    fn fetch(&mut self) -> Option<Effect> {
        if self.fetch_in_flight {
            return None;
        }
        self.fetch_in_flight = true;
        Some(Effect::FetchGames)
    }

    fn on_games(&mut self, now: DateTime<Utc>, result: tossup_core::Result<Vec<Game>>) -> Vec<Effect> {
        self.fetch_in_flight = false;

        if matches!(self.phase, Phase::Flipping | Phase::Result) {
            return Vec::new();
        }

        let games = match result {
            Ok(games) => games,
            Err(e) => {
                tracing::warn!("Failed to fetch upcoming games: {}", e);
                return Vec::new();
            }
        };

        // a locked game is finished through its own cycle first
        if self.game.as_ref().map_or(false, |game| !game.starts_after(now)) {
            return Vec::new();
        }

        let Some(next) = next_upcoming(games, now) else {
            if self.phase == Phase::Idle {
                tracing::debug!("No upcoming game yet");
            }
            return Vec::new();
        };

        match &self.game {
            Some(current) if current.id == next.id => {
                self.game = Some(next);
                self.advance(now)
            }
            _ => self.acquire(next, now),
        }
    }

    fn acquire(&mut self, game: Game, now: DateTime<Utc>) -> Vec<Effect> {
        let dropped = self.slip.clear();
        if dropped > 0 {
            tracing::warn!(
                "Switching games, dropped {} unsubmitted entries",
                dropped
            );
        }

        self.epoch += 1;
        tracing::info!("Tracking game {} (epoch {})", game.id, self.epoch);

        self.game = Some(game);
        self.phase = Phase::Timer;
        self.gate = SubmissionGate::new();
        self.locked = false;
        self.poll_attempts = 0;
        self.outcome = None;

        let mut effects = vec![Effect::CancelTimers];
        effects.extend(self.advance(now));
        effects
    }

    /// Countdown, guard-time submission and the move to `Flipping`.
    fn advance(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        let Some(start) = self.game.as_ref().and_then(|game| game.start_time) else {
            return Vec::new();
        };

        self.countdown = format_countdown(start, now);
        let remaining = start - now;
        self.locked = remaining <= chrono::Duration::zero();

        if !self.locked {
            if remaining <= self.guard && !self.slip.is_empty() {
                return self.begin_submit().into_iter().collect();
            }
            return Vec::new();
        }

        match self.gate.state() {
            GateState::InFlight => Vec::new(),
            // last chance for entries that never got an attempt
            GateState::Open if !self.slip.is_empty() && self.gate.attempts() == 0 => {
                self.begin_submit().into_iter().collect()
            }
            _ => self.enter_flipping(),
        }
    }

    fn begin_submit(&mut self) -> Option<Effect> {
        if !self.gate.try_begin() {
            return None;
        }

        let game_id = self.game.as_ref()?.id.clone();
        tracing::info!(
            "Submitting {} entries to game {} (attempt {})",
            self.slip.len(),
            game_id,
            self.gate.attempts()
        );

        Some(Effect::Submit {
            epoch: self.epoch,
            game_id,
            entries: self.slip.entries().to_vec(),
        })
    }

    fn on_submitted(&mut self, now: DateTime<Utc>, result: tossup_core::Result<()>) -> Vec<Effect> {
        let mut effects = Vec::new();

        match result {
            Ok(()) => {
                self.gate.finish(true);
                let sent = self.slip.clear();
                tracing::info!("Submitted {} entries", sent);
                effects.push(Effect::RefreshPoints);
            }
            Err(e) => {
                self.gate.finish(false);
                tracing::warn!("Entry submission failed: {}", e);

                // retried on the next tick while the window is still open
                let before_lock = self
                    .game
                    .as_ref()
                    .map_or(false, |game| game.starts_after(now));
                if before_lock {
                    return effects;
                }
            }
        }

        effects.extend(self.advance(now));
        effects
    }

    fn enter_flipping(&mut self) -> Vec<Effect> {
        let dropped = self.slip.clear();
        if dropped > 0 {
            tracing::warn!("Betting closed, {} entries were not submitted", dropped);
        }
        self.gate.close();

        self.phase = Phase::Flipping;
        self.locked = true;
        self.countdown = STARTING_NOW.to_string();
        self.poll_attempts = 0;

        vec![Effect::Schedule {
            epoch: self.epoch,
            kind: TimerKind::Animation,
            after: self.config.flip_duration,
        }]
    }

    fn on_timer(&mut self, kind: TimerKind) -> Vec<Effect> {
        match (kind, self.phase) {
            (TimerKind::Animation, Phase::Flipping) | (TimerKind::Poll, Phase::Flipping) => {
                self.poll()
            }
            (TimerKind::Dwell, Phase::Result) => {
                let mut effects = self.reset_to_idle();
                effects.push(Effect::RefreshPoints);
                effects
            }
            _ => Vec::new(),
        }
    }

    fn poll(&mut self) -> Vec<Effect> {
        let Some(game) = &self.game else {
            return Vec::new();
        };

        self.poll_attempts += 1;
        tracing::debug!(
            "Polling result for game {} (attempt {}/{})",
            game.id,
            self.poll_attempts,
            self.config.max_poll_attempts
        );

        vec![Effect::PollResult {
            epoch: self.epoch,
            game_id: game.id.clone(),
        }]
    }

    fn on_poll(&mut self, result: tossup_core::Result<Game>) -> Vec<Effect> {
        match result {
            Ok(game) => match game.result {
                Some(side) => return self.show_result(side, game),
                None => tracing::debug!("Game {} has no result yet", game.id),
            },
            Err(e) => tracing::debug!("Result poll failed: {}", e),
        }

        if self.poll_attempts >= self.config.max_poll_attempts {
            tracing::warn!(
                "No result after {} attempts, moving on to the next game",
                self.poll_attempts
            );
            return self.reset_to_idle();
        }

        vec![Effect::Schedule {
            epoch: self.epoch,
            kind: TimerKind::Poll,
            after: self.config.poll_interval,
        }]
    }

    fn show_result(&mut self, side: CoinSide, game: Game) -> Vec<Effect> {
        let settlement = Settlement::compute(
            side,
            game.entries.iter().map(Wager::from),
            self.config.house_cut_rate,
        );

        tracing::info!(
            "Game {} landed {}: {} winners, pot {}",
            game.id,
            side,
            settlement.winners.len(),
            settlement.distributable_pot
        );

        self.outcome = Some(RoundOutcome {
            game_id: game.id.clone(),
            result: side,
            total_pool: game.total_pool,
            settlement,
        });
        self.game = Some(game);
        self.phase = Phase::Result;

        vec![
            Effect::Schedule {
                epoch: self.epoch,
                kind: TimerKind::Dwell,
                after: self.config.result_dwell,
            },
            Effect::RefreshPoints,
            Effect::RefreshHistory,
        ]
    }

    fn reset_to_idle(&mut self) -> Vec<Effect> {
        self.epoch += 1;
        self.phase = Phase::Idle;
        self.game = None;
        self.slip.clear();
        self.gate = SubmissionGate::new();
        self.locked = false;
        self.countdown.clear();
        self.poll_attempts = 0;
        self.outcome = None;

        let mut effects = vec![Effect::CancelTimers];
        effects.extend(self.fetch());
        effects
    }
}
