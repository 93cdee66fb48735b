//! Response and request shapes exactly as the backend speaks them.
//!
//! Everything here is decoded once and converted into the typed values in
//! `crate::types`; nothing outside the `api` module sees these structs.

use crate::error::{Result, TossupError};
use crate::types::{CoinSide, Game, GameEntry, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The `{ success, data, message }` wrapper most endpoints use.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn into_data(self, what: &str) -> Result<T> {
        if !self.success {
            return Err(TossupError::rejected(
                self.message.unwrap_or_else(|| format!("{} failed", what)),
            ));
        }

        self.data
            .ok_or_else(|| TossupError::invalid_response(format!("{}: missing data", what)))
    }
}

/// Largest stake or pool accepted from the backend.
pub(crate) const MAX_AMOUNT: u64 = i64::MAX as u64;

/// `get-all-games` has been seen both bare and wrapped.
///
/// Elements stay as raw JSON so one malformed game cannot sink the list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum GameList {
    Bare(Vec<Value>),
    Wrapped(Envelope<Vec<Value>>),
}

impl GameList {
    pub fn into_games(self) -> Result<Vec<Game>> {
        let raw = match self {
            GameList::Bare(raw) => raw,
            GameList::Wrapped(envelope) => envelope.into_data("Listing games")?,
        };

        Ok(raw.into_iter().filter_map(decode_listed_game).collect())
    }
}

fn decode_listed_game(raw: Value) -> Option<Game> {
    let decoded = serde_json::from_value::<GameDto>(raw)
        .map_err(TossupError::from)
        .and_then(Game::try_from);

    match decoded {
        Ok(game) => Some(game),
        Err(e) => {
            tracing::warn!("Skipping unreadable game: {}", e);
            None
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GameDto {
    #[serde(rename = "_id", default)]
    object_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default, deserialize_with = "flexible_amount")]
    total_pool: u64,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    entries: Vec<EntryDto>,
    /// Older games carry their stakes here instead of `entries`.
    #[serde(default)]
    members: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EntryDto {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "_id", default)]
    object_id: Option<String>,
    #[serde(default)]
    center_id: Option<String>,
    #[serde(default)]
    center: Option<String>,
    #[serde(default, deserialize_with = "flexible_amount")]
    amount: u64,
    #[serde(default)]
    bet: Option<String>,
}

impl From<EntryDto> for GameEntry {
    fn from(dto: EntryDto) -> Self {
        GameEntry {
            id: dto.id.or(dto.object_id).unwrap_or_default(),
            center_id: dto.center_id.or(dto.center).unwrap_or_default(),
            amount: dto.amount,
            bet: dto.bet.unwrap_or_default(),
        }
    }
}

impl TryFrom<GameDto> for Game {
    type Error = TossupError;

    fn try_from(dto: GameDto) -> Result<Self> {
        let id = dto
            .object_id
            .or(dto.id)
            .ok_or_else(|| TossupError::invalid_response("game without an id"))?;

        let result = match dto.result.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(CoinSide::parse(raw).ok_or_else(|| {
                TossupError::invalid_response(format!("game {} has unknown result '{}'", id, raw))
            })?),
        };

        let mut entries: Vec<GameEntry> = dto.entries.into_iter().map(GameEntry::from).collect();
        if entries.is_empty() {
            entries = dto
                .members
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|member| serde_json::from_value::<EntryDto>(member).ok())
                .map(GameEntry::from)
                .collect();
        }

        Ok(Game {
            start_time: parse_timestamp(&id, "startTime", dto.start_time.as_deref()),
            created_at: parse_timestamp(&id, "createdAt", dto.created_at.as_deref()),
            id,
            total_pool: dto.total_pool,
            result,
            entries,
        })
    }
}

fn parse_timestamp(game_id: &str, field: &str, raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!("Game {} has unreadable {} '{}': {}", game_id, field, raw, e);
            None
        }
    }
}

/// Amounts arrive as numbers, numeric strings or not at all, and must fit
/// under `MAX_AMOUNT`.
fn flexible_amount<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    amount_from_value(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {}", value)))
}

pub(crate) fn amount_from_value(value: &Value) -> Option<u64> {
    let amount = match value {
        Value::Null => Some(0),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) if s.trim().is_empty() => Some(0),
        Value::String(s) => s.trim().parse::<u64>().ok().or_else(|| {
            s.trim()
                .parse::<f64>()
                .ok()
                .filter(|f| *f >= 0.0)
                .map(|f| f.round() as u64)
        }),
        _ => None,
    }?;

    (amount <= MAX_AMOUNT).then_some(amount)
}

pub(crate) fn points_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Object(map) => map.get("points").and_then(points_from_value),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub phone: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddEntriesRequest<'a> {
    pub game_id: &'a str,
    pub entries: &'a [EntrySubmission],
}

/// One local bet as the `add-entries` endpoint expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySubmission {
    pub id: String,
    pub center_id: String,
    pub amount: String,
    pub bet: String,
    pub result: String,
}

impl EntrySubmission {
    pub fn new(label: &str, center_id: &str, side: CoinSide, amount: u64) -> Self {
        Self {
            id: label.to_string(),
            center_id: center_id.to_string(),
            amount: amount.to_string(),
            bet: side.as_wire().to_string(),
            result: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_wrapped_game() {
        let raw = json!({
            "success": true,
            "data": {
                "_id": "665f00000000000000abc123",
                "startTime": "2025-06-01T10:02:00.000Z",
                "totalPool": "600",
                "result": "Tails",
                "entries": [
                    { "id": "#1001", "centerId": "u1", "amount": "100", "bet": "heads", "result": "", "_id": "e1" },
                    { "id": "#1002", "centerId": "u2", "amount": 300, "bet": "tails", "result": "" }
                ]
            }
        });

        let envelope: Envelope<GameDto> = serde_json::from_value(raw).unwrap();
        let game = Game::try_from(envelope.into_data("Fetching game").unwrap()).unwrap();

        assert_eq!(game.id, "665f00000000000000abc123");
        assert_eq!(game.total_pool, 600);
        assert_eq!(game.result, Some(CoinSide::Tails));
        assert_eq!(game.entries.len(), 2);
        assert_eq!(game.entries[0].id, "#1001");
        assert_eq!(game.entries[1].amount, 300);
        assert!(game.start_time.is_some());
    }

    #[test]
    fn test_bare_and_wrapped_lists() {
        let bare: GameList =
            serde_json::from_value(json!([{ "_id": "g1", "result": "" }])).unwrap();
        let games = bare.into_games().unwrap();
        assert_eq!(games.len(), 1);
        assert!(games[0].result.is_none());

        let wrapped: GameList =
            serde_json::from_value(json!({ "success": true, "data": [{ "_id": "g2" }] }))
                .unwrap();
        assert_eq!(wrapped.into_games().unwrap()[0].id, "g2");

        let refused: GameList =
            serde_json::from_value(json!({ "success": false, "message": "maintenance" }))
                .unwrap();
        match refused.into_games() {
            Err(TossupError::Rejected(msg)) => assert_eq!(msg, "maintenance"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_games_are_skipped() {
        let list: GameList = serde_json::from_value(json!([
            { "_id": "good", "totalPool": "300" },
            { "_id": "bad", "totalPool": "n/a" },
            { "_id": "huge", "totalPool": u64::MAX },
            { "_id": "nullbet", "entries": [{ "id": "#1001", "amount": 5, "bet": null }] },
            { "totalPool": 10 }
        ]))
        .unwrap();

        let games = list.into_games().unwrap();
        let ids: Vec<&str> = games.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["good", "nullbet"]);
        assert_eq!(games[1].entries[0].bet, "");
        assert!(games[1].entries[0].side().is_none());
    }

    #[test]
    fn test_amount_bounds() {
        assert_eq!(amount_from_value(&json!(null)), Some(0));
        assert_eq!(amount_from_value(&json!("12.6")), Some(13));
        assert_eq!(amount_from_value(&json!(MAX_AMOUNT)), Some(MAX_AMOUNT));
        assert_eq!(amount_from_value(&json!(MAX_AMOUNT + 1)), None);
        assert_eq!(amount_from_value(&json!(-5)), None);
        assert_eq!(amount_from_value(&json!("1e30")), None);
    }

    #[test]
    fn test_legacy_members_become_entries() {
        let dto: GameDto = serde_json::from_value(json!({
            "_id": "g3",
            "members": [
                { "name": "A", "center": "c1", "amount": "200", "bet": "Heads", "result": "", "_id": "m1" },
                "c2"
            ]
        }))
        .unwrap();

        let game = Game::try_from(dto).unwrap();
        assert_eq!(game.entries.len(), 1);
        assert_eq!(game.entries[0].center_id, "c1");
        assert_eq!(game.entries[0].id, "m1");
    }

    #[test]
    fn test_unknown_result_is_rejected() {
        let dto: GameDto = serde_json::from_value(json!({ "_id": "g4", "result": "edge" })).unwrap();
        assert!(matches!(
            Game::try_from(dto),
            Err(TossupError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_submission_body_shape() {
        let entries = vec![EntrySubmission::new("#1001", "u1", CoinSide::Heads, 250)];
        let body = serde_json::to_value(AddEntriesRequest {
            game_id: "g1",
            entries: &entries,
        })
        .unwrap();

        assert_eq!(
            body,
            json!({
                "gameId": "g1",
                "entries": [{ "id": "#1001", "centerId": "u1", "amount": "250", "bet": "heads", "result": "" }]
            })
        );
    }

    #[test]
    fn test_points_shapes() {
        assert_eq!(points_from_value(&json!(1500)), Some(1500));
        assert_eq!(points_from_value(&json!("42")), Some(42));
        assert_eq!(points_from_value(&json!({ "points": 7 })), Some(7));
        assert_eq!(points_from_value(&json!(null)), None);
    }
}
