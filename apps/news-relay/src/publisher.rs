use crate::error::RelayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver a rendered message. Returns false on any failure; never panics
    /// or propagates errors.
    async fn publish(&self, message: &str) -> bool;
}

#[derive(Serialize, Debug)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize, Debug)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

/// Bot API `sendMessage` to a single channel, HTML parse mode.
pub struct TelegramPublisher {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramPublisher {
    pub fn new(
        client: reqwest::Client,
        api_base: impl Into<String>,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    async fn send_message(&self, text: &str) -> Result<(), RelayError> {
        // Token is part of the path - never log this URL
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let res = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::PublishFailed(e.without_url().to_string()))?;

        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        let parsed: Option<TelegramResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let description = parsed.and_then(|r| r.description).unwrap_or(body);
            return Err(RelayError::PublishFailed(format!("HTTP {}: {}", status, description)));
        }

        match parsed {
            Some(TelegramResponse { ok: false, description }) => Err(RelayError::PublishFailed(
                description.unwrap_or_else(|| "ok=false".to_string()),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Publisher for TelegramPublisher {
    #[instrument(skip(self, message), fields(chat_id = %self.chat_id, message_chars = message.chars().count()))]
    async fn publish(&self, message: &str) -> bool {
        match self.send_message(message).await {
            Ok(()) => {
                info!("Message sent to Telegram");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to send message to Telegram");
                false
            }
        }
    }
}

/// Logs the rendered message instead of sending it.
pub struct DryRunPublisher;

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn publish(&self, message: &str) -> bool {
        info!(message = %message, "Dry run, message not sent");
        true
    }
}
