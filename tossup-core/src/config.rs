use crate::error::{Result, TossupError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:4000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL every endpoint path is joined onto.
    pub api_base_url: String,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(TossupError::config("API base URL cannot be empty"));
        }

        let url = reqwest::Url::parse(&self.api_base_url)
            .map_err(|e| TossupError::config(format!("Invalid API base URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TossupError::config(format!(
                "API base URL must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(TossupError::config("Request timeout must be greater than 0"));
        }

        Ok(())
    }
}
