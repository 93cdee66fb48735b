use crate::error::{GameError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tossup_core::{CoinSide, EntrySubmission};

/// Labels start here and count up with each entry on the slip.
const FIRST_LABEL: usize = 1001;

/// A stake entered locally and not yet sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetEntry {
    pub id: String,
    pub side: CoinSide,
    pub amount: u64,
    pub created_at: DateTime<Utc>,
}

impl BetEntry {
    pub fn to_submission(&self, center_id: &str) -> EntrySubmission {
        EntrySubmission::new(&self.id, center_id, self.side, self.amount)
    }
}

/// Local entries for the current game, in the order they were placed.
#[derive(Debug, Clone, Default)]
pub struct BetSlip {
    entries: Vec<BetEntry>,
}

impl BetSlip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, side: CoinSide, amount: u64, now: DateTime<Utc>) -> Result<&BetEntry> {
        if amount == 0 {
            return Err(GameError::InvalidAmount);
        }

        let id = format!("#{}", FIRST_LABEL + self.entries.len());
        self.entries.push(BetEntry {
            id,
            side,
            amount,
            created_at: now,
        });

        let entry = &self.entries[self.entries.len() - 1];
        tracing::debug!("Added entry {} ({} on {})", entry.id, entry.amount, entry.side);
        Ok(entry)
    }

    pub fn entries(&self) -> &[BetEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |sum, entry| sum.saturating_add(entry.amount))
    }

    /// Empty the slip, returning how many entries were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateState {
    /// Nothing sent yet, or the last attempt failed.
    Open,
    InFlight,
    Submitted,
    /// Betting window over without a successful submission.
    Closed,
}

/// One-shot guard around the per-game entry submission.
#[derive(Debug, Clone)]
pub struct SubmissionGate {
    state: GateState,
    attempts: u32,
}

impl Default for SubmissionGate {
    fn default() -> Self {
        Self {
            state: GateState::Open,
            attempts: 0,
        }
    }
}

impl SubmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_open(&self) -> bool {
        self.state == GateState::Open
    }

    /// Claim the gate for one attempt; false if not open.
    pub fn try_begin(&mut self) -> bool {
        if self.state != GateState::Open {
            return false;
        }

        self.state = GateState::InFlight;
        self.attempts += 1;
        true
    }

    pub fn finish(&mut self, success: bool) {
        if self.state != GateState::InFlight {
            return;
        }

        self.state = if success {
            GateState::Submitted
        } else {
            GateState::Open
        };
    }

    pub fn close(&mut self) {
        if self.state == GateState::Open {
            self.state = GateState::Closed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slip_labels_and_totals() {
        let now = Utc::now();
        let mut slip = BetSlip::new();

        assert_eq!(slip.add(CoinSide::Heads, 100, now).unwrap().id, "#1001");
        assert_eq!(slip.add(CoinSide::Tails, 250, now).unwrap().id, "#1002");
        assert!(matches!(
            slip.add(CoinSide::Heads, 0, now),
            Err(GameError::InvalidAmount)
        ));

        assert_eq!(slip.len(), 2);
        assert_eq!(slip.total(), 350);
        assert_eq!(slip.entries()[0].side, CoinSide::Heads);

        assert_eq!(slip.clear(), 2);
        assert!(slip.is_empty());
        assert_eq!(slip.add(CoinSide::Tails, 5, now).unwrap().id, "#1001");
    }

    #[test]
    fn test_gate_is_one_shot_after_success() {
        let mut gate = SubmissionGate::new();
        assert!(gate.try_begin());
        assert!(!gate.try_begin());

        gate.finish(true);
        assert_eq!(gate.state(), GateState::Submitted);
        assert!(!gate.try_begin());

        gate.close();
        assert_eq!(gate.state(), GateState::Submitted);
        assert_eq!(gate.attempts(), 1);
    }

    #[test]
    fn test_gate_reopens_after_failure() {
        let mut gate = SubmissionGate::new();
        assert!(gate.try_begin());
        gate.finish(false);
        assert!(gate.is_open());

        assert!(gate.try_begin());
        assert_eq!(gate.attempts(), 2);
        gate.finish(false);

        gate.close();
        assert_eq!(gate.state(), GateState::Closed);
        assert!(!gate.try_begin());
    }

    #[test]
    fn test_submission_shape() {
        let entry = BetEntry {
            id: "#1001".to_string(),
            side: CoinSide::Tails,
            amount: 300,
            created_at: Utc::now(),
        };
        let submission = entry.to_submission("center-9");
        assert_eq!(submission.center_id, "center-9");
        assert_eq!(submission.amount, "300");
        assert_eq!(submission.bet, "tails");
        assert!(submission.result.is_empty());
    }
}
