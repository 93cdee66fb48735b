pub mod session_store;

pub use session_store::SessionStore;

use crate::error::{Result, TossupError};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

/// Key/value rows for client state that must survive restarts.
///
/// Only the login lives here today: `token` and the cached `user` JSON.
const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS client_state (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );
";

/// The local SQLite file behind an async lock.
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(dir) = db_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                TossupError::internal(format!("Cannot create {}: {}", dir.display(), e))
            })?;
        }

        tracing::debug!("Opening client state at {}", db_path.display());
        Self::with_connection(Connection::open(db_path)?)
    }

    /// Storage that lives only as long as the process.
    pub async fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
