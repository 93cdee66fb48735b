use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tossup_core::config::DEFAULT_API_URL;
use tossup_core::ClientConfig;
use tossup_game::LifecycleConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub api_url: String,
    pub verbose: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api_url: DEFAULT_API_URL.to_string(),
            verbose: false,
        }
    }
}

impl CliConfig {
    pub fn new(data_dir: Option<PathBuf>, api_url: Option<String>, verbose: bool) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: data_dir.unwrap_or(defaults.data_dir),
            api_url: api_url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or(defaults.api_url),
            verbose,
        }
    }

    pub fn client(&self) -> ClientConfig {
        ClientConfig::new(&self.api_url)
    }

    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig::default()
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tossup")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let config = CliConfig::new(
            Some(PathBuf::from("/tmp/tossup-test")),
            Some(" https://api.trontools.ai ".to_string()),
            true,
        );
        assert_eq!(config.data_dir, PathBuf::from("/tmp/tossup-test"));
        assert_eq!(config.client().api_base_url, "https://api.trontools.ai");
        assert!(config.verbose);
    }

    #[test]
    fn test_blank_url_falls_back() {
        let config = CliConfig::new(None, Some("  ".to_string()), false);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.data_dir.ends_with("tossup"));
    }
}
