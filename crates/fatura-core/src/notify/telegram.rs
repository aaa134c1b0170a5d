//! Telegram Bot API transport.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Notifier;
use crate::error::NotifyError;
use crate::models::config::NotifyConfig;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends messages through a bot's `sendMessage` method.
pub struct TelegramNotifier {
    http: Client,
    url: String,
}

impl TelegramNotifier {
    pub fn new(config: &NotifyConfig, bot_token: &str) -> Self {
        Self {
            http: Client::new(),
            url: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                bot_token
            ),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, channel_id: &str, message: &str) -> Result<(), NotifyError> {
        let request = SendMessage {
            chat_id: channel_id,
            text: message,
            parse_mode: "Markdown",
        };

        debug!(chat_id = channel_id, len = message.len(), "Sending Telegram message");

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            // reqwest errors include the URL, which holds the bot token
            .map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(NotifyError::Api { status: status.as_u16(), body });
        }

        check_body(&body)
    }
}

fn check_body(body: &str) -> Result<(), NotifyError> {
    let parsed: ApiResponse = serde_json::from_str(body)
        .map_err(|e| NotifyError::Rejected(format!("unreadable response: {}", e)))?;
    if parsed.ok {
        Ok(())
    } else {
        Err(NotifyError::Rejected(
            parsed.description.unwrap_or_else(|| "ok=false".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_flag_is_checked() {
        assert!(check_body(r#"{"ok": true, "result": {}}"#).is_ok());

        let err = check_body(r#"{"ok": false, "description": "Bad Request: chat not found"}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "message rejected: Bad Request: chat not found");

        assert!(matches!(check_body("<html>"), Err(NotifyError::Rejected(_))));
    }

    #[test]
    fn test_request_shape() {
        let json = serde_json::to_value(SendMessage {
            chat_id: "-100",
            text: "oi",
            parse_mode: "Markdown",
        })
        .unwrap();
        assert_eq!(json["chat_id"], "-100");
        assert_eq!(json["parse_mode"], "Markdown");
    }
}
