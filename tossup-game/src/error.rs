use thiserror::Error;

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Core error: {0}")]
    Core(#[from] tossup_core::TossupError),

    #[error("No upcoming game")]
    NoActiveGame,

    #[error("Betting is closed for game {0}")]
    BettingClosed(String),

    #[error("Bet amount must be a positive whole number")]
    InvalidAmount,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Game controller has stopped")]
    ControllerStopped,
}

impl GameError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
