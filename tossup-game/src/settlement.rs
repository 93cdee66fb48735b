//! Splitting the losing pool between winners.
//!
//! The backend is the authority on payouts and point balances; this is the
//! same arithmetic run locally so a result can be shown the moment it lands.
//!
//! Each winner's share is rounded on its own, so the shares can add up to a
//! few units more or less than the distributable pot. That drift is kept as
//! is rather than corrected.

use crate::slip::BetEntry;
use serde::{Deserialize, Serialize};
use tossup_core::{CoinSide, GameEntry};

/// A stake as settlement sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wager {
    pub label: String,
    /// Account that placed the stake, when known.
    pub owner: Option<String>,
    /// `None` for sides the client does not recognise; those always lose.
    pub side: Option<CoinSide>,
    pub amount: u64,
}

impl From<&GameEntry> for Wager {
    fn from(entry: &GameEntry) -> Self {
        Self {
            label: entry.id.clone(),
            owner: Some(entry.center_id.clone()).filter(|id| !id.is_empty()),
            side: entry.side(),
            amount: entry.amount,
        }
    }
}

impl From<&BetEntry> for Wager {
    fn from(entry: &BetEntry) -> Self {
        Self {
            label: entry.id.clone(),
            owner: None,
            side: Some(entry.side),
            amount: entry.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub wager: Wager,
    /// Winnings on top of the returned stake.
    pub share: u64,
    /// Stake plus share.
    pub payout: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub result: CoinSide,
    pub house_cut_rate: f64,
    pub winners: Vec<Payout>,
    pub losers: Vec<Wager>,
    pub losers_total: u64,
    pub house_cut: u64,
    pub distributable_pot: u64,
    pub winners_stake: u64,
}

impl Settlement {
    pub fn compute<I>(result: CoinSide, wagers: I, house_cut_rate: f64) -> Self
    where
        I: IntoIterator<Item = Wager>,
    {
        let rate = if house_cut_rate.is_finite() {
            house_cut_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let (winning, losers): (Vec<Wager>, Vec<Wager>) = wagers
            .into_iter()
            .partition(|wager| wager.side == Some(result));

        let losers_total = stake_total(losers.iter());
        let house_cut = ((losers_total as f64) * rate).round() as u64;
        let distributable_pot = losers_total.saturating_sub(house_cut);
        let winners_stake = stake_total(winning.iter());

        let winners = if winners_stake == 0 {
            Vec::new()
        } else {
            winning
                .into_iter()
                .map(|wager| {
                    let ratio = wager.amount as f64 / winners_stake as f64;
                    let share = (ratio * distributable_pot as f64).round() as u64;
                    Payout {
                        payout: wager.amount.saturating_add(share),
                        share,
                        wager,
                    }
                })
                .collect()
        };

        Self {
            result,
            house_cut_rate: rate,
            winners,
            losers,
            losers_total,
            house_cut,
            distributable_pot,
            winners_stake,
        }
    }

    pub fn total_paid(&self) -> u64 {
        self.winners
            .iter()
            .fold(0u64, |sum, p| sum.saturating_add(p.payout))
    }

    /// Paid out minus (winning stakes + pot); zero when nobody won.
    pub fn rounding_drift(&self) -> i64 {
        if self.winners.is_empty() {
            return 0;
        }
        let owed = self.winners_stake as i128 + self.distributable_pot as i128;
        clamp_i64(self.total_paid() as i128 - owed)
    }

    /// What one account staked and gets back in this settlement.
    pub fn outcome_for(&self, owner: &str) -> PlayerOutcome {
        let owned = |wager: &Wager| wager.owner.as_deref() == Some(owner);

        let won_stake = stake_total(
            self.winners
                .iter()
                .map(|p| &p.wager)
                .filter(|w| owned(w)),
        );
        let lost_stake = stake_total(self.losers.iter().filter(|w| owned(w)));
        let returned = self
            .winners
            .iter()
            .filter(|p| owned(&p.wager))
            .fold(0u64, |sum, p| sum.saturating_add(p.payout));

        PlayerOutcome {
            staked: won_stake.saturating_add(lost_stake),
            returned,
        }
    }
}

/// Stakes come from the backend, so sums saturate instead of overflowing.
fn stake_total<'a>(wagers: impl Iterator<Item = &'a Wager>) -> u64 {
    wagers.fold(0u64, |sum, w| sum.saturating_add(w.amount))
}

fn clamp_i64(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerOutcome {
    pub staked: u64,
    pub returned: u64,
}

impl PlayerOutcome {
    pub fn net(&self) -> i64 {
        clamp_i64(self.returned as i128 - self.staked as i128)
    }

    pub fn took_part(&self) -> bool {
        self.staked > 0
    }
}
