//! Server configuration loaded from TOML with environment overrides.

use crate::games::GameCategory;
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Runtime settings for the game server.
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    host: String,

    /// Bind port.
    port: u16,

    /// SQLite database path; identities and outcomes are off without it.
    database_url: Option<String>,

    /// Delay before an automated participant rolls.
    automated_roll_delay_ms: u64,

    /// Delay between an automated roll and its move.
    automated_move_delay_ms: u64,

    /// Delay before a human's unplayable roll is skipped.
    auto_skip_delay_ms: u64,

    /// Grace period before a finished session is removed.
    cleanup_grace_ms: u64,

    /// Matchmaking group size when the request names none.
    default_group_size: usize,

    /// Private room capacity when the request names none.
    max_room_players: usize,

    /// Seed for reproducible dice.
    dice_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            database_url: None,
            automated_roll_delay_ms: 1000,
            automated_move_delay_ms: 1500,
            auto_skip_delay_ms: 1500,
            cleanup_grace_ms: 5000,
            default_group_size: 2,
            max_room_players: 4,
            dice_seed: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed TOML or unknown value types.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        info!(host = %config.host, port = config.port, "Config loaded");
        Ok(config)
    }

    /// Applies `DATABASE_URL` from the environment, if set.
    #[instrument(skip(self))]
    pub fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            debug!("DATABASE_URL overrides config");
            self.database_url = Some(url);
        }
        self
    }

    /// Overrides the bind address.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Overrides the bind port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Fixes the dice seed.
    pub fn with_dice_seed(mut self, seed: Option<u64>) -> Self {
        self.dice_seed = seed;
        self
    }

    /// Socket address string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Delay before an automated roll.
    pub fn automated_roll_delay(&self) -> Duration {
        Duration::from_millis(self.automated_roll_delay_ms)
    }

    /// Delay before an automated move.
    pub fn automated_move_delay(&self) -> Duration {
        Duration::from_millis(self.automated_move_delay_ms)
    }

    /// Delay before a human's unplayable roll is skipped.
    pub fn auto_skip_delay(&self) -> Duration {
        Duration::from_millis(self.auto_skip_delay_ms)
    }

    /// Grace period before a finished session is removed.
    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_millis(self.cleanup_grace_ms)
    }

    /// Matchmaking group size for a request, clamped to the category's range.
    pub fn group_size_for(&self, category: GameCategory, requested: Option<usize>) -> usize {
        category.clamp_group_size(requested.unwrap_or(self.default_group_size))
    }

    /// Private room capacity for a request, clamped to the category's range.
    pub fn room_capacity_for(&self, category: GameCategory, requested: Option<usize>) -> usize {
        category.clamp_group_size(requested.unwrap_or(self.max_room_players))
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr(), "127.0.0.1:3001");
        assert_eq!(config.automated_move_delay(), Duration::from_millis(1500));
    }

    #[test]
    fn test_partial_file_overrides() {
        let config = ServerConfig::from_toml(
            r#"
            port = 9000
            cleanup_grace_ms = 10
            dice_seed = 42
            "#,
        )
        .unwrap();
        assert_eq!(*config.port(), 9000);
        assert_eq!(config.cleanup_grace(), Duration::from_millis(10));
        assert_eq!(*config.dice_seed(), Some(42));
        assert_eq!(config.host(), "127.0.0.1");
    }

    #[test]
    fn test_bad_toml_reports_location() {
        let err = ServerConfig::from_toml("port = \"high\"").unwrap_err();
        assert!(err.message.contains("Failed to parse config"));
        assert!(err.file.ends_with("config.rs"));
    }

    #[test]
    fn test_sizes_are_clamped() {
        let config = ServerConfig::default();
        assert_eq!(config.group_size_for(GameCategory::Ludo, None), 2);
        assert_eq!(config.group_size_for(GameCategory::Ludo, Some(9)), 4);
        assert_eq!(config.room_capacity_for(GameCategory::Ludo, Some(1)), 2);
        assert_eq!(config.room_capacity_for(GameCategory::Ludo, None), 4);
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = ServerConfig::from_file("/nonexistent/parlor.toml").unwrap_err();
        assert!(err.message.contains("Failed to read config file"));
    }
}
