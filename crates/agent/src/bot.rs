//! The bot: command handling on top of a chat transport.
//!
//! Messages are handled one at a time, in arrival order, so replies within
//! a conversation are never reordered. Every entry point checks the sender
//! against the allow-list before doing any work.

use second_core::channel::{Channel, ChannelMessage};
use second_core::error::ChannelError;
use second_memory::ConversationHistory;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::health::{HealthAggregator, HealthStatus, ServiceState};
use crate::persistence::PersistenceDispatcher;
use crate::pipeline::{Inbound, Responder};

pub const DENIAL_REPLY: &str = "Sorry, this bot is private.";
pub const REMEMBER_USAGE: &str = "Usage: /remember <something to store>";
pub const REMEMBERED_REPLY: &str = "Remembered.";
pub const REMEMBER_FAILED_REPLY: &str = "Failed to store. Is Watcher running?";
pub const CLEARED_REPLY: &str = "Conversation history cleared.";
pub const NOTHING_TO_CLEAR_REPLY: &str = "No history to clear.";

/// A parsed inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Status,
    /// Trailing text to store; may be empty
    Remember(String),
    Clear,
    /// Free text for the pipeline
    Chat(String),
    /// A slash command this bot doesn't know
    Unknown(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim_start();
        let Some(body) = trimmed.strip_prefix('/') else {
            return Command::Chat(text.to_string());
        };

        let (head, rest) = body
            .split_once(char::is_whitespace)
            .unwrap_or((body, ""));
        // "/status@second_bot" in group chats
        let name = head.split('@').next().unwrap_or(head);

        match name {
            "start" => Command::Start,
            "help" => Command::Help,
            "status" => Command::Status,
            "remember" => Command::Remember(rest.trim().to_string()),
            "clear" => Command::Clear,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Values shown by `/start` and `/status`.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub name: String,
    pub model: String,
    pub inference_timeout: Duration,
    pub typing_interval: Duration,
}

impl BotSettings {
    pub fn from_config(config: &second_config::AppConfig) -> Self {
        Self {
            name: config.identity.name.clone(),
            model: config.ollama.model.clone(),
            inference_timeout: Duration::from_secs(config.ollama.timeout_secs),
            typing_interval: Duration::from_secs(4),
        }
    }
}

pub struct Bot {
    channel: Arc<dyn Channel>,
    responder: Arc<dyn Responder>,
    history: ConversationHistory,
    persistence: Arc<PersistenceDispatcher>,
    health: HealthAggregator,
    settings: BotSettings,
}

impl Bot {
    pub fn new(
        channel: Arc<dyn Channel>,
        responder: Arc<dyn Responder>,
        history: ConversationHistory,
        persistence: Arc<PersistenceDispatcher>,
        health: HealthAggregator,
        settings: BotSettings,
    ) -> Self {
        Self {
            channel,
            responder,
            history,
            persistence,
            health,
            settings,
        }
    }

    /// Drive the transport until `shutdown` fires or the channel closes.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), ChannelError> {
        let mut inbound = self.channel.start().await?;
        info!(channel = self.channel.name(), "Bot is running");

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = inbound.recv() => next,
            };
            match next {
                Some(Ok(msg)) => self.handle_message(&msg).await,
                Some(Err(e)) => warn!(error = %e, "Transport error"),
                None => {
                    info!("Transport closed");
                    break;
                }
            }
        }

        self.channel.stop().await
    }

    pub async fn handle_message(&self, msg: &ChannelMessage) {
        if !self.channel.is_allowed(&msg.sender_id) {
            warn!(
                sender_id = %msg.sender_id,
                sender_name = msg.sender_name.as_deref().unwrap_or("-"),
                "Unauthorized access attempt"
            );
            self.reply(&msg.chat_id, DENIAL_REPLY).await;
            return;
        }

        let command = Command::parse(&msg.content);
        debug!(chat_id = %msg.chat_id, "Handling message");

        match command {
            Command::Start | Command::Help => {
                let status = self.health.check().await;
                self.reply(&msg.chat_id, &self.greeting(&status)).await;
            }
            Command::Status => {
                let status = self.health.check().await;
                let cached = self.history.len(&chat_key(msg)).await / 2;
                self.reply(&msg.chat_id, &self.status_report(&status, cached)).await;
            }
            Command::Remember(text) if text.is_empty() => {
                self.reply(&msg.chat_id, REMEMBER_USAGE).await;
            }
            Command::Remember(text) => {
                let stored = self
                    .with_typing(&msg.chat_id, self.persistence.store_note(&text))
                    .await;
                let reply = match stored {
                    Ok(()) => {
                        info!(preview = %preview(&text), "Stored via /remember");
                        REMEMBERED_REPLY
                    }
                    Err(_) => REMEMBER_FAILED_REPLY,
                };
                self.reply(&msg.chat_id, reply).await;
            }
            Command::Clear => {
                let reply = if self.history.clear(&chat_key(msg)).await {
                    CLEARED_REPLY
                } else {
                    NOTHING_TO_CLEAR_REPLY
                };
                self.reply(&msg.chat_id, reply).await;
            }
            Command::Chat(text) => {
                info!(sender_id = %msg.sender_id, preview = %preview(&text), "Message received");
                let inbound = Inbound {
                    conversation_id: chat_key(msg),
                    message_id: msg.message_id.clone(),
                    text,
                };
                let answer = self
                    .with_typing(&msg.chat_id, self.responder.respond(&inbound))
                    .await;
                self.reply(&msg.chat_id, &answer).await;
            }
            Command::Unknown(name) => {
                debug!(command = %name, "Ignoring unknown command");
            }
        }
    }

    fn greeting(&self, status: &HealthStatus) -> String {
        let state = if status.is_healthy() { "ONLINE" } else { "DEGRADED" };
        let services: Vec<String> = status
            .services
            .iter()
            .map(|(name, s)| {
                let icon = if *s == ServiceState::Up { '+' } else { '!' };
                format!("  [{icon}] {name}: {}", s.as_str())
            })
            .collect();

        format!(
            "{} {state}\nModel: {}\n\nServices:\n{}\n\nCommands:\n\
             /status - Service health\n\
             /remember - Store a note in memory\n\
             /clear - Reset conversation history\n\
             /help - Show this message\n\n\
             Send any message to chat.",
            self.settings.name,
            self.settings.model,
            services.join("\n"),
        )
    }

    fn status_report(&self, status: &HealthStatus, cached_exchanges: usize) -> String {
        let mut lines = vec![
            format!("{}: {}", self.settings.name, status.composite.as_str()),
            format!("Model: {}", self.settings.model),
            format!("LLM timeout: {}s", self.settings.inference_timeout.as_secs()),
            format!("History: {} exchanges (in-memory)", self.history.max_turns() / 2),
            String::new(),
            "Services:".to_string(),
        ];
        lines.extend(
            status
                .services
                .iter()
                .map(|(name, s)| format!("  {name}: {}", s.as_str())),
        );
        lines.push(String::new());
        lines.push(format!("Conversation: {cached_exchanges} exchanges cached"));
        lines.join("\n")
    }

    /// Run `work` while re-sending the typing indicator at a fixed interval.
    async fn with_typing<F: Future>(&self, chat_id: &str, work: F) -> F::Output {
        let done = CancellationToken::new();

        let typing = async {
            loop {
                if let Err(e) = self.channel.send_typing(chat_id).await {
                    debug!(error = %e, "Typing indicator failed");
                }
                tokio::select! {
                    _ = done.cancelled() => break,
                    _ = tokio::time::sleep(self.settings.typing_interval) => {}
                }
            }
        };
        let work = async {
            let output = work.await;
            done.cancel();
            output
        };

        let ((), output) = tokio::join!(typing, work);
        output
    }

    async fn reply(&self, chat_id: &str, text: &str) {
        if let Err(e) = self.channel.send(chat_id, text).await {
            error!(chat_id = %chat_id, error = %e, "Failed to send reply");
        }
    }
}

fn chat_key(msg: &ChannelMessage) -> second_core::message::ConversationId {
    second_core::message::ConversationId::from(msg.chat_id.as_str())
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}
