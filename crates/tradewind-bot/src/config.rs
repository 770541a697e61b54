//! Bot configuration loaded from the environment.

use std::path::PathBuf;

use tradewind_core::defaults::{
    CONVERSATION_TIMEOUT_SECS, DISCORD_API_BASE, IMAGE_STORAGE_PATH, MAX_LIFETIME_SECS,
    SUBMISSION_TTL_SECS,
};
use tradewind_core::{Error, Result};
use tradewind_jobs::SweeperConfig;

/// Runtime configuration for the bot binary.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub database_url: String,
    /// Bot token; without one messages are only logged.
    pub discord_token: Option<String>,
    pub discord_api_base: String,
    pub submission_ttl_secs: u64,
    pub conversation_timeout_secs: u64,
    /// Where screenshots wait while a submission is in flight.
    pub image_storage_path: PathBuf,
    pub sweeper: SweeperConfig,
    /// Read operator commands from stdin.
    pub console: bool,
}

impl BotConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DATABASE_URL` | required | PostgreSQL connection string |
    /// | `DISCORD_TOKEN` | unset | Bot token for direct messages |
    /// | `DISCORD_API_BASE` | `https://discord.com/api/v10` | REST base URL |
    /// | `SUBMISSION_TTL_SECS` | `300` | Pending submission lifetime |
    /// | `CONVERSATION_TIMEOUT_SECS` | `1800` | Conversation inactivity window |
    /// | `IMAGE_STORAGE_PATH` | `./data/images` | Screenshot directory |
    /// | `CONSOLE` | `false` | Run the stdin operator console |
    ///
    /// Both lifetimes are clamped to `1..=MAX_LIFETIME_SECS` (30 days).
    ///
    /// Sweeper variables are read by [`SweeperConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Config("DATABASE_URL must be set".to_string()))?;

        let discord_token = std::env::var("DISCORD_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let discord_api_base =
            std::env::var("DISCORD_API_BASE").unwrap_or_else(|_| DISCORD_API_BASE.to_string());

        let submission_ttl_secs = std::env::var("SUBMISSION_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(SUBMISSION_TTL_SECS, clamp_lifetime);

        let conversation_timeout_secs = std::env::var("CONVERSATION_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(CONVERSATION_TIMEOUT_SECS, clamp_lifetime);

        let image_storage_path = std::env::var("IMAGE_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(IMAGE_STORAGE_PATH));

        let console = std::env::var("CONSOLE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            database_url,
            discord_token,
            discord_api_base,
            submission_ttl_secs,
            conversation_timeout_secs,
            image_storage_path,
            sweeper: SweeperConfig::from_env(),
            console,
        })
    }

    /// Defaults for everything except the database URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            discord_token: None,
            discord_api_base: DISCORD_API_BASE.to_string(),
            submission_ttl_secs: SUBMISSION_TTL_SECS,
            conversation_timeout_secs: CONVERSATION_TIMEOUT_SECS,
            image_storage_path: PathBuf::from(IMAGE_STORAGE_PATH),
            sweeper: SweeperConfig::default(),
            console: false,
        }
    }

    pub fn with_discord_token(mut self, token: impl Into<String>) -> Self {
        self.discord_token = Some(token.into());
        self
    }

    pub fn with_console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    pub fn with_submission_ttl(mut self, secs: u64) -> Self {
        self.submission_ttl_secs = clamp_lifetime(secs);
        self
    }

    pub fn with_conversation_timeout(mut self, secs: u64) -> Self {
        self.conversation_timeout_secs = clamp_lifetime(secs);
        self
    }

    pub fn submission_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.submission_ttl_secs as i64)
    }

    pub fn conversation_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.conversation_timeout_secs as i64)
    }
}

fn clamp_lifetime(secs: u64) -> u64 {
    secs.clamp(1, MAX_LIFETIME_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BotConfig::new("postgres://localhost/tradewind");
        assert!(config.discord_token.is_none());
        assert_eq!(config.submission_ttl(), chrono::Duration::minutes(5));
        assert_eq!(config.conversation_timeout(), chrono::Duration::minutes(30));
        assert_eq!(config.image_storage_path, PathBuf::from("./data/images"));
        assert!(!config.console);
    }

    #[test]
    fn test_builders() {
        let config = BotConfig::new("postgres://x")
            .with_discord_token("t0k3n")
            .with_submission_ttl(0)
            .with_conversation_timeout(60)
            .with_console(true);
        assert!(config.console);
        assert_eq!(config.discord_token.as_deref(), Some("t0k3n"));
        assert_eq!(config.submission_ttl_secs, 1);
        assert_eq!(config.conversation_timeout(), chrono::Duration::minutes(1));
    }

    #[test]
    fn test_huge_lifetimes_are_capped() {
        let config = BotConfig::new("postgres://x")
            .with_submission_ttl(u64::MAX)
            .with_conversation_timeout(u64::MAX);
        assert_eq!(config.submission_ttl(), chrono::Duration::days(30));
        assert_eq!(config.conversation_timeout(), chrono::Duration::days(30));
        assert!(config.conversation_timeout() > chrono::Duration::zero());
    }
}
