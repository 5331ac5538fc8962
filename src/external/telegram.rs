use crate::config::TelegramConfig;
use crate::error::{AppError, AppResult};
use crate::services::MessageTransport;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API `sendMessage`
#[derive(Clone)]
pub struct TelegramService {
    http: Client,
    config: TelegramConfig,
}

impl TelegramService {
    pub fn new(config: TelegramConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent("lottery-backend/telegram")
            .timeout(Duration::from_secs(config.send_timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn is_enabled(&self) -> bool {
        !self.config.bot_token.is_empty()
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        )
    }
}

#[async_trait]
impl MessageTransport for TelegramService {
    async fn send(&self, chat_id: i64, text: &str) -> AppResult<()> {
        let body = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .http
            .post(self.send_message_url())
            .json(&body)
            .send()
            .await
            // the request URL carries the bot token
            .map_err(|e| AppError::ReqwestError(e.without_url()))?;

        let status = response.status();
        let parsed: Option<SendMessageResponse> = response.json().await.ok();

        match parsed {
            Some(r) if status.is_success() && r.ok => Ok(()),
            Some(r) => Err(AppError::ExternalApiError(format!(
                "Telegram sendMessage to {chat_id} failed: HTTP {}: {}",
                status.as_u16(),
                r.description.unwrap_or_default()
            ))),
            None => Err(AppError::ExternalApiError(format!(
                "Telegram sendMessage to {chat_id} failed: HTTP {}",
                status.as_u16()
            ))),
        }
    }
}
