//! Telegram Bot API client
//!
//! Only the two calls the relay needs: `sendMessage` and `getUpdates`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::channel::{ChannelError, PushChannel};

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    base_url: String,
    send_timeout: Duration,
}

impl TelegramClient {
    /// Create a client for the bot identified by `token`
    ///
    /// Every call is bounded by `send_timeout`; long polls get their own poll
    /// timeout on top of it.
    pub fn new(api_url: &str, token: &str, send_timeout: Duration) -> Result<Self, ChannelError> {
        let http = Client::builder().connect_timeout(send_timeout).build()?;

        Ok(Self {
            http,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            send_timeout,
        })
    }

    async fn call<T, B>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, ChannelError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        debug!("Calling Telegram method {}", method);

        let response: ApiResponse<T> = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .timeout(timeout)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(ChannelError::Api(
                response
                    .description
                    .unwrap_or_else(|| format!("{} failed", method)),
            ));
        }

        response
            .result
            .ok_or_else(|| ChannelError::Api(format!("{} returned no result", method)))
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64, poll_secs: u64) -> Result<Vec<Update>, ChannelError> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": poll_secs,
                "allowed_updates": ["message"],
            }),
            self.send_timeout + Duration::from_secs(poll_secs),
        )
        .await
    }
}

#[async_trait]
impl PushChannel for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ChannelError> {
        let _sent: serde_json::Value = self
            .call(
                "sendMessage",
                &json!({
                    "chat_id": chat_id,
                    "text": text,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }),
                self.send_timeout,
            )
            .await?;
        Ok(())
    }
}
