//! Telegram channel adapter.
//!
//! Implements the Channel trait over the Telegram Bot API:
//! - long polling via `getUpdates`, tracking the update offset
//! - `sendMessage`, splitting replies at the 4096-character limit
//! - `sendChatAction` for the typing indicator
//! - `getMe` as the health check
//!
//! Messages can also be injected in-process, which is how tests drive it.

use async_trait::async_trait;
use second_core::channel::{Channel, ChannelId, ChannelMessage};
use second_core::error::ChannelError;
use second_core::health::HealthProbe;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::split::split_message;

/// Telegram's hard limit on message length.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Pause before polling again after a failed `getUpdates`.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub bot_token: String,
    /// Allowed user IDs. Empty = deny all.
    pub allowed_users: Vec<String>,
    /// Bot API base URL.
    pub api_url: String,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_secs: u64,
}

impl TelegramConfig {
    /// Build from the app config; fails when the bot token is unset.
    pub fn from_app(config: &second_config::AppConfig) -> Result<Self, second_config::ConfigError> {
        let token = config.require_bot_token()?;
        let allowed_users = if config.telegram.authorized_user_id.is_empty() {
            vec![]
        } else {
            vec![config.telegram.authorized_user_id.clone()]
        };
        Ok(Self {
            bot_token: token.to_string(),
            allowed_users,
            api_url: config.telegram.api_url.trim_end_matches('/').to_string(),
            poll_timeout_secs: config.telegram.poll_timeout_secs,
        })
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("allowed_users", &self.allowed_users)
            .field("api_url", &self.api_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

/// Telegram channel adapter.
pub struct TelegramChannel {
    config: TelegramConfig,
    channel_id: ChannelId,
    client: reqwest::Client,
    shutdown: CancellationToken,
    /// Sender for injecting messages (tests, local tooling).
    inject_tx: tokio::sync::Mutex<Option<mpsc::Sender<Result<ChannelMessage, ChannelError>>>>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            channel_id: ChannelId("telegram".into()),
            client: reqwest::Client::new(),
            shutdown: CancellationToken::new(),
            inject_tx: tokio::sync::Mutex::new(None),
        }
    }

    /// Inject a message as if it came from Telegram.
    pub async fn inject_message(&self, msg: ChannelMessage) -> Result<(), ChannelError> {
        let guard = self.inject_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            tx.send(Ok(msg))
                .await
                .map_err(|_| ChannelError::ConnectionLost("Message channel closed".into()))
        } else {
            Err(ChannelError::ConnectionLost("Channel not started".into()))
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.config.api_url, self.config.bot_token, method)
    }

    /// POST a Bot API method and unwrap the `{ok, result}` envelope.
    async fn call<T: serde::de::DeserializeOwned>(
        client: &reqwest::Client,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T, ChannelError> {
        let response = client
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionLost(strip_token(&e.to_string())))?;

        let reply: ApiReply<T> = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidPayload(strip_token(&e.to_string())))?;

        match (reply.ok, reply.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(ChannelError::InvalidPayload(
                reply.description.unwrap_or_else(|| "Bot API returned ok=false".into()),
            )),
        }
    }

    /// The long-polling loop. Runs until `shutdown` fires or the receiver
    /// is dropped.
    async fn poll_updates(
        client: reqwest::Client,
        url: String,
        poll_timeout_secs: u64,
        tx: mpsc::Sender<Result<ChannelMessage, ChannelError>>,
        shutdown: CancellationToken,
    ) {
        let mut offset: i64 = 0;
        // HTTP timeout must outlast the server-side long poll.
        let http_timeout = Duration::from_secs(poll_timeout_secs + 10);

        loop {
            let body = serde_json::json!({
                "offset": offset,
                "timeout": poll_timeout_secs,
                "allowed_updates": ["message"],
            });

            let fetched = tokio::select! {
                _ = shutdown.cancelled() => break,
                r = Self::call::<Vec<Update>>(&client, &url, &body, http_timeout) => r,
            };

            match fetched {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if let Some(msg) = update.into_channel_message() {
                            if tx.send(Ok(msg)).await.is_err() {
                                debug!("Telegram receiver dropped, stopping poll loop");
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Telegram getUpdates failed, retrying");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                    }
                }
            }
        }

        info!("Telegram poll loop stopped");
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        if self.config.bot_token.is_empty() {
            return Err(ChannelError::NotConfigured("Telegram bot token is empty".into()));
        }

        info!("Telegram channel starting (long polling)");
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx.clone());

        tokio::spawn(Self::poll_updates(
            self.client.clone(),
            self.method_url("getUpdates"),
            self.config.poll_timeout_secs,
            tx,
            self.shutdown.clone(),
        ));

        Ok(rx)
    }

    async fn send(&self, chat_id: &str, content: &str) -> Result<(), ChannelError> {
        let url = self.method_url("sendMessage");
        let parts = split_message(content, TELEGRAM_MESSAGE_LIMIT);
        debug!(chat_id = %chat_id, parts = parts.len(), content_len = content.len(), "Telegram send");

        for part in parts {
            let body = serde_json::json!({ "chat_id": chat_id, "text": part });
            Self::call::<serde_json::Value>(&self.client, &url, &body, Duration::from_secs(30))
                .await
                .map_err(|e| ChannelError::DeliveryFailed {
                    channel: "telegram".into(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({ "chat_id": chat_id, "action": "typing" });
        Self::call::<bool>(
            &self.client,
            &self.method_url("sendChatAction"),
            &body,
            Duration::from_secs(10),
        )
        .await
        .map(|_| ())
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        self.config.allowed_users.iter().any(|u| u == sender_id)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Telegram channel stopping");
        self.shutdown.cancel();
        *self.inject_tx.lock().await = None;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        if self.config.bot_token.is_empty() {
            return Ok(false);
        }
        let me: Result<serde_json::Value, _> = Self::call(
            &self.client,
            &self.method_url("getMe"),
            &serde_json::json!({}),
            Duration::from_secs(10),
        )
        .await;
        Ok(me.is_ok())
    }
}

#[async_trait]
impl HealthProbe for TelegramChannel {
    fn probe_name(&self) -> &str {
        "telegram"
    }

    async fn is_up(&self) -> bool {
        self.health_check().await.unwrap_or(false)
    }
}

/// reqwest errors echo the request URL, which contains the bot token.
fn strip_token(message: &str) -> String {
    let Some(start) = message.find("/bot") else {
        return message.to_string();
    };
    let token_start = start + "/bot".len();
    match message[token_start..].find('/') {
        Some(len) => format!(
            "{}/bot[REDACTED]{}",
            &message[..start],
            &message[token_start + len..]
        ),
        None => message.to_string(),
    }
}

// --- Bot API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiReply<T> {
    ok: bool,
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    #[serde(default)]
    from: Option<TgUser>,
    chat: TgChat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

impl Update {
    /// Text messages only; stickers, photos and service messages are skipped.
    fn into_channel_message(self) -> Option<ChannelMessage> {
        let message = self.message?;
        let text = message.text?;
        let from = message.from?;
        Some(ChannelMessage {
            channel_id: ChannelId("telegram".into()),
            sender_id: from.id.to_string(),
            sender_name: from.username,
            content: text,
            chat_id: message.chat.id.to_string(),
            message_id: message.message_id.to_string(),
        })
    }
}
