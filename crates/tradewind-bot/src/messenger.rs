//! Outbound direct-message backends.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use tradewind_core::defaults::MESSAGING_TIMEOUT_SECS;
use tradewind_core::{Error, Messenger, Result};

/// Discord rejects message content longer than this.
pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
struct DmChannel {
    id: String,
}

/// Sends direct messages through the Discord REST API.
#[derive(Clone)]
pub struct DiscordRestMessenger {
    client: Client,
    base_url: String,
    token: String,
}

impl DiscordRestMessenger {
    pub fn new(token: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(MESSAGING_TIMEOUT_SECS))
            .build()?;
        info!(base_url, "Initializing Discord REST messenger");
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bot {}", self.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Messaging(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Messaging(format!("Discord returned {status}: {body}")));
        }
        Ok(response)
    }

    async fn open_dm(&self, user_id: &str) -> Result<String> {
        let channel: DmChannel = self
            .post("/users/@me/channels", json!({ "recipient_id": user_id }))
            .await?
            .json()
            .await
            .map_err(|e| Error::Messaging(format!("Invalid DM channel response: {e}")))?;
        Ok(channel.id)
    }
}

#[async_trait]
impl Messenger for DiscordRestMessenger {
    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<()> {
        let channel_id = self.open_dm(user_id).await?;
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            self.post(
                &format!("/channels/{channel_id}/messages"),
                json!({ "content": chunk }),
            )
            .await?;
        }
        debug!(user_id, "Direct message sent");
        Ok(())
    }
}

/// Messenger used when no bot token is configured: logs and succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<()> {
        info!(user_id, text, "Direct message (log only)");
        Ok(())
    }
}

/// Split on char boundaries into pieces of at most `max` chars, preferring
/// to break after a newline.
pub fn split_message(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for line in text.split_inclusive('\n') {
        for ch in line.chars() {
            if count == max {
                chunks.push(std::mem::take(&mut current));
                count = 0;
            }
            current.push(ch);
            count += 1;
        }
        if count > 0 && count + 1 > max / 2 && line.ends_with('\n') {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_single_chunk() {
        assert_eq!(split_message("hello", 2000), vec!["hello".to_string()]);
        assert_eq!(split_message("", 2000), vec![String::new()]);
    }

    #[test]
    fn test_long_message_respects_limit() {
        let text = "é".repeat(4500);
        let chunks = split_message(&text, 2000);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 2000));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_prefers_newline_breaks_once_half_full() {
        let text = format!("{}\n{}", "a".repeat(6), "b".repeat(3));
        let chunks = split_message(&text, 10);
        assert_eq!(chunks, vec!["aaaaaa\n".to_string(), "bbb".to_string()]);
    }

    #[tokio::test]
    async fn test_log_messenger_always_succeeds() {
        LogMessenger.send_direct_message("u", "hi").await.unwrap();
    }

    #[test]
    fn test_discord_messenger_trims_base_url() {
        let m = DiscordRestMessenger::new("token", "https://example.test/api/").unwrap();
        assert_eq!(m.base_url, "https://example.test/api");
    }
}
