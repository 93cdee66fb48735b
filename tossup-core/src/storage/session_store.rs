use crate::error::Result;
use crate::storage::Storage;
use crate::types::User;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

/// Reads and writes the persisted login under fixed keys.
pub struct SessionStore<'a> {
    storage: &'a Storage,
}

impl<'a> SessionStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn save(&self, token: &str, user: &User) -> Result<()> {
        let user_json = serde_json::to_string(user)?;
        let mut conn = self.storage.get_connection().await;
        let now = Utc::now().timestamp();

        let tx = conn.transaction()?;
        for (key, value) in [(TOKEN_KEY, token), (USER_KEY, user_json.as_str())] {
            tx.execute(
                "INSERT OR REPLACE INTO client_state (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, value, now],
            )?;
        }
        tx.commit()?;

        Ok(())
    }

    pub async fn save_user(&self, user: &User) -> Result<()> {
        let user_json = serde_json::to_string(user)?;
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO client_state (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![USER_KEY, user_json, Utc::now().timestamp()],
        )?;

        Ok(())
    }

    pub async fn load_token(&self) -> Result<Option<String>> {
        self.load_raw(TOKEN_KEY).await
    }

    /// A stored user that no longer parses is treated as absent.
    pub async fn load_user(&self) -> Result<Option<User>> {
        let Some(raw) = self.load_raw(USER_KEY).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                tracing::warn!("Discarding unreadable stored user: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn clear(&self) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "DELETE FROM client_state WHERE key IN (?1, ?2)",
            params![TOKEN_KEY, USER_KEY],
        )?;

        Ok(())
    }

    async fn load_raw(&self, key: &str) -> Result<Option<String>> {
        let conn = self.storage.get_connection().await;

        let value = conn
            .query_row(
                "SELECT value FROM client_state WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }
}
