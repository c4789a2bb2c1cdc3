//! Outbound push channel

use async_trait::async_trait;
use thiserror::Error;

/// Why a message could not be pushed
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    /// The remote API answered but refused the call
    #[error("API error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs carry the bot token
        ChannelError::Http(err.without_url())
    }
}

/// A messenger able to push text to a chat
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Send an HTML formatted message to `chat_id`
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ChannelError>;
}
