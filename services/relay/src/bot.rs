//! Incoming bot messages
//!
//! `/start` binds the sender's `@username` to the chat the relay will deliver
//! codes to. Everything else only gets a short hint.

use common::{bindings::BindingStore, error::DatabaseResult, format::normalize_subject};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::channel::PushChannel;
use crate::messages::escape_html;
use crate::telegram::{Message, TelegramClient};

/// Long poll duration of `getUpdates`, in seconds
const LONG_POLL_SECS: u64 = 25;

/// Pause after a failed poll
const RETRY_DELAY: Duration = Duration::from_secs(3);

const HELP_TEXT: &str = "/start - link your Telegram account\n/help - show this help\n\n\
Verification codes arrive here once you request them in the web app.";

const NO_USERNAME_TEXT: &str = "Your Telegram account has no @username.\n\
Set one in Telegram Settings → Username, then send /start again.";

const CODE_HINT_TEXT: &str = "Codes are entered in the web app, not here.";

const FALLBACK_TEXT: &str = "I only deliver codes. Send /start to link your account.";

/// Bot commands the relay understands
#[derive(Debug, PartialEq)]
enum Command {
    Start,
    Help,
    Code,
    Other,
}

fn parse_command(text: &str) -> Command {
    let text = text.trim();

    static CODE_REGEX: OnceLock<Regex> = OnceLock::new();
    let code_regex =
        CODE_REGEX.get_or_init(|| Regex::new(r"^\d{6}$").expect("Failed to compile code regex"));

    // `/start`, `/start@some_bot` and `/start payload` are all the same command
    let command = text
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .split('@')
        .next()
        .unwrap_or_default();

    match command {
        "/start" => Command::Start,
        "/help" => Command::Help,
        _ if code_regex.is_match(text) => Command::Code,
        _ => Command::Other,
    }
}

/// Work out the reply to an incoming message, creating the binding on `/start`
///
/// Returns `None` for messages without text.
pub async fn handle_message(
    bindings: &BindingStore,
    message: &Message,
) -> DatabaseResult<Option<String>> {
    let Some(text) = message.text.as_deref() else {
        return Ok(None);
    };

    let reply = match parse_command(text) {
        Command::Start => {
            let from = message.from.as_ref();
            let subject = normalize_subject(
                from.and_then(|u| u.username.as_deref())
                    .unwrap_or_default(),
            );
            if subject.is_empty() {
                return Ok(Some(NO_USERNAME_TEXT.to_string()));
            }

            let previous = bindings.find(&subject).await?;
            bindings
                .upsert(
                    &subject,
                    message.chat.id,
                    from.and_then(|u| u.first_name.as_deref()),
                    from.and_then(|u| u.last_name.as_deref()),
                )
                .await?;

            match previous {
                Some(binding) if binding.chat_id == message.chat.id => format!(
                    "{} is already linked to this chat ✅",
                    escape_html(&subject)
                ),
                _ => format!(
                    "Done, {} is linked ✅\nGo back to the web app and request your code.",
                    escape_html(&subject)
                ),
            }
        }
        Command::Help => HELP_TEXT.to_string(),
        Command::Code => CODE_HINT_TEXT.to_string(),
        Command::Other => FALLBACK_TEXT.to_string(),
    };

    Ok(Some(reply))
}

/// Long-poll Telegram for messages and answer them until the task is aborted
pub async fn run_update_listener(client: Arc<TelegramClient>, bindings: BindingStore) {
    info!("Starting Telegram update listener");
    let mut offset = 0;

    loop {
        let updates = match client.get_updates(offset, LONG_POLL_SECS).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("Failed to fetch Telegram updates: {}", e);
                sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };

            match handle_message(&bindings, &message).await {
                Ok(Some(reply)) => {
                    if let Err(e) = client.send_message(message.chat.id, &reply).await {
                        warn!("Failed to reply in chat {}: {}", message.chat.id, e);
                    }
                }
                Ok(None) => {}
                Err(e) => error!("Failed to handle message in chat {}: {}", message.chat.id, e),
            }
        }
    }
}
