//! Past games as shown in the player's history and the results strip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tossup_core::{CoinSide, Game};

pub const HISTORY_LIMIT: usize = 5;
pub const RECENT_RESULTS_LIMIT: usize = 10;

/// Sort by creation time, newest first. Games without a timestamp go last.
pub fn newest_first(games: &mut [Game]) {
    games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Results of the latest finished games, oldest first.
pub fn recent_results(games: &[Game], limit: usize) -> Vec<CoinSide> {
    let mut finished: Vec<&Game> = games.iter().filter(|game| game.is_finished()).collect();
    finished.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut results: Vec<CoinSide> = finished
        .into_iter()
        .take(limit)
        .filter_map(|game| game.result)
        .collect();
    results.reverse();
    results
}

/// `H T T H` style rendering of a results strip.
pub fn results_strip(results: &[CoinSide]) -> String {
    results
        .iter()
        .map(|side| side.initial().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub game_id: String,
    pub short_id: String,
    pub result: Option<CoinSide>,
    pub entry_count: usize,
    pub staked: u64,
    pub total_pool: u64,
    pub created_at: Option<DateTime<Utc>>,
}

/// The player's latest games with their own entry count and stake.
pub fn player_history(games: &[Game], user_id: &str, limit: usize) -> Vec<HistoryRow> {
    let mut sorted = games.to_vec();
    newest_first(&mut sorted);

    sorted
        .iter()
        .take(limit)
        .map(|game| {
            let (entry_count, staked) = game
                .entries_for(user_id)
                .fold((0usize, 0u64), |(count, sum), entry| {
                    (count + 1, sum.saturating_add(entry.amount))
                });

            HistoryRow {
                game_id: game.id.clone(),
                short_id: game.short_id().to_string(),
                result: game.result,
                entry_count,
                staked,
                total_pool: game.total_pool,
                created_at: game.created_at,
            }
        })
        .collect()
}
