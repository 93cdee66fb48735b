use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One face of the coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoinSide {
    Heads,
    Tails,
}

impl CoinSide {
    /// Case-insensitive match against the strings the backend uses.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("heads") {
            Some(Self::Heads)
        } else if raw.eq_ignore_ascii_case("tails") {
            Some(Self::Tails)
        } else {
            None
        }
    }

    /// Lowercase form sent in request bodies.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Heads => "heads",
            Self::Tails => "tails",
        }
    }

    pub fn initial(&self) -> char {
        match self {
            Self::Heads => 'H',
            Self::Tails => 'T',
        }
    }

}

impl fmt::Display for CoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heads => write!(f, "Heads"),
            Self::Tails => write!(f, "Tails"),
        }
    }
}

impl FromStr for CoinSide {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h" => Ok(Self::Heads),
            "t" => Ok(Self::Tails),
            other => Self::parse(other).ok_or_else(|| format!("'{}' is not heads or tails", s)),
        }
    }
}

/// The logged-in account as returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub points: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A stake recorded by the backend against a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEntry {
    pub id: String,
    pub center_id: String,
    pub amount: u64,
    /// Raw side string; anything unrecognised settles as a losing stake.
    pub bet: String,
}

impl GameEntry {
    pub fn side(&self) -> Option<CoinSide> {
        CoinSide::parse(&self.bet)
    }
}

/// Server-owned snapshot of one betting round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub start_time: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub total_pool: u64,
    pub result: Option<CoinSide>,
    pub entries: Vec<GameEntry>,
}

impl Game {
    /// Last six characters of the id, the form shown to players.
    pub fn short_id(&self) -> &str {
        let start = self
            .id
            .char_indices()
            .rev()
            .nth(5)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        &self.id[start..]
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    pub fn starts_after(&self, now: DateTime<Utc>) -> bool {
        self.start_time.map_or(false, |start| start > now)
    }

    pub fn side_totals(&self) -> SideTotals {
        SideTotals::from_entries(&self.entries)
    }

    pub fn entries_for<'a>(&'a self, center_id: &'a str) -> impl Iterator<Item = &'a GameEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.center_id == center_id)
    }
}

/// Total staked on each side of a game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideTotals {
    pub heads: u64,
    pub tails: u64,
}

impl SideTotals {
    pub fn from_entries(entries: &[GameEntry]) -> Self {
        entries
            .iter()
            .fold(Self::default(), |mut totals, entry| {
                let side = match entry.side() {
                    Some(CoinSide::Heads) => &mut totals.heads,
                    Some(CoinSide::Tails) => &mut totals.tails,
                    None => return totals,
                };
                *side = side.saturating_add(entry.amount);
                totals
            })
    }

    pub fn total(&self) -> u64 {
        self.heads.saturating_add(self.tails)
    }
}

/// Pick the soonest game that has not started yet.
pub fn next_upcoming(games: Vec<Game>, now: DateTime<Utc>) -> Option<Game> {
    games
        .into_iter()
        .filter(|game| game.starts_after(now))
        .min_by_key(|game| game.start_time)
}
