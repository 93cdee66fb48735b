use thiserror::Error;

pub type Result<T> = std::result::Result<T, TossupError>;

#[derive(Error, Debug)]
pub enum TossupError {
    #[error("Not logged in")]
    Unauthenticated,

    #[error("Session rejected by server: {0}")]
    Unauthorized(String),

    #[error("Network connection error: {0}")]
    NetworkConnection(String),

    #[error("Server error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Game not found: {id}")]
    GameNotFound { id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TossupError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn network_connection(msg: impl Into<String>) -> Self {
        Self::NetworkConnection(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}

impl From<reqwest::Error> for TossupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TossupError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            TossupError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            TossupError::NetworkConnection(err.to_string())
        }
    }
}
