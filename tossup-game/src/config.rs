use crate::error::{GameError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and payout knobs for the game lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Countdown refresh.
    pub tick_interval: Duration,
    /// How often the upcoming game is re-fetched while betting or idle.
    pub refresh_interval: Duration,
    /// Entries are submitted this long before lock.
    pub submit_guard: Duration,
    /// Length of the flip animation before the first result poll.
    pub flip_duration: Duration,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    /// How long a result stays on screen before the next game.
    pub result_dwell: Duration,
    /// Fraction of the losing pool the house keeps.
    pub house_cut_rate: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            refresh_interval: Duration::from_secs(10),
            submit_guard: Duration::from_secs(2),
            flip_duration: Duration::from_secs(7),
            poll_interval: Duration::from_secs(1),
            max_poll_attempts: 20,
            result_dwell: Duration::from_secs(5),
            house_cut_rate: 0.10,
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("tick interval", self.tick_interval),
            ("refresh interval", self.refresh_interval),
            ("poll interval", self.poll_interval),
        ] {
            if value.is_zero() {
                return Err(GameError::config(format!("{} must be greater than 0", name)));
            }
        }

        if self.max_poll_attempts == 0 {
            return Err(GameError::config("Max poll attempts must be at least 1"));
        }

        if !self.house_cut_rate.is_finite() || !(0.0..=1.0).contains(&self.house_cut_rate) {
            return Err(GameError::config(format!(
                "House cut rate must be between 0 and 1, got {}",
                self.house_cut_rate
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = LifecycleConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_poll_attempts, 20);
        assert_eq!(config.house_cut_rate, 0.10);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = LifecycleConfig::default();
        config.house_cut_rate = 1.5;
        assert!(config.validate().is_err());

        let mut config = LifecycleConfig::default();
        config.house_cut_rate = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = LifecycleConfig::default();
        config.max_poll_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = LifecycleConfig::default();
        config.tick_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
