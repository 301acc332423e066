//! Shared scripted collaborators for the pipeline and bot tests.

use async_trait::async_trait;
use second_core::channel::{Channel, ChannelId, ChannelMessage};
use second_core::error::{ChannelError, MemoryError, ProviderError};
use second_core::health::HealthProbe;
use second_core::knowledge::{KnowledgeSource, MemoryEvent, MemoryStore, RetrievalResult};
use second_core::provider::{Provider, ProviderRequest, ProviderResponse};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::pipeline::{Inbound, Responder};

enum Script {
    Replies(VecDeque<String>),
    Fail(ProviderError),
}

/// A provider that plays back scripted replies in order, or always fails.
///
/// Panics if asked for more replies than were scripted.
pub struct ScriptedProvider {
    script: Mutex<Script>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn replies(replies: &[&str]) -> Self {
        Self::with_script(Script::Replies(replies.iter().map(|r| r.to_string()).collect()))
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::with_script(Script::Fail(error))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock().unwrap();
        match &mut *script {
            Script::Fail(e) => Err(e.clone()),
            Script::Replies(queue) => {
                let content = queue
                    .pop_front()
                    .unwrap_or_else(|| panic!("ScriptedProvider: no more replies"));
                Ok(ProviderResponse {
                    content,
                    model: "mock-model".into(),
                })
            }
        }
    }
}

/// A knowledge source with canned results.
pub struct ScriptedSource {
    name: String,
    priority: u8,
    label: String,
    results: Vec<(String, f32)>,
    fail: bool,
    delay: Option<Duration>,
}

impl ScriptedSource {
    /// An empty, healthy source.
    pub fn new(name: &str, priority: u8, label: &str) -> Self {
        Self {
            name: name.into(),
            priority,
            label: label.into(),
            results: Vec::new(),
            fail: false,
            delay: None,
        }
    }

    pub fn with_results(mut self, results: &[(&str, f32)]) -> Self {
        self.results = results.iter().map(|(c, s)| (c.to_string(), *s)).collect();
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl KnowledgeSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn search(&self, _query: &str) -> Result<Vec<RetrievalResult>, MemoryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(MemoryError::Unreachable {
                service: self.name.clone(),
                reason: "connection refused".into(),
            });
        }
        Ok(self
            .results
            .iter()
            .map(|(content, score)| RetrievalResult {
                source: self.name.clone(),
                label: self.label.clone(),
                content: content.clone(),
                score: *score,
            })
            .collect())
    }
}

/// A memory store that records writes, or rejects them.
pub struct RecordingStore {
    events: Mutex<Vec<MemoryEvent>>,
    attempts: Mutex<usize>,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            attempts: Mutex::new(0),
            fail: false,
            delay: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn events(&self) -> Vec<MemoryEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl MemoryStore for RecordingStore {
    fn name(&self) -> &str {
        "recording"
    }

    async fn write(&self, event: MemoryEvent) -> Result<(), MemoryError> {
        *self.attempts.lock().unwrap() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(MemoryError::Status {
                service: "recording".into(),
                status: 503,
            });
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// A probe with a fixed answer.
pub struct StaticProbe {
    name: String,
    up: bool,
    delay: Option<Duration>,
}

impl StaticProbe {
    pub fn new(name: &str, up: bool) -> Self {
        Self {
            name: name.into(),
            up,
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl HealthProbe for StaticProbe {
    fn probe_name(&self) -> &str {
        &self.name
    }

    async fn is_up(&self) -> bool {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.up
    }
}

/// A responder with a fixed answer, or one that echoes the input.
pub struct FixedResponder {
    reply: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<usize>,
}

impl FixedResponder {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Some(reply.into()),
            delay: None,
            calls: Mutex::new(0),
        }
    }

    pub fn echo() -> Self {
        Self {
            reply: None,
            delay: None,
            calls: Mutex::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Responder for FixedResponder {
    async fn respond(&self, inbound: &Inbound) -> String {
        *self.calls.lock().unwrap() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().unwrap_or_else(|| inbound.text.clone())
    }
}

/// An in-process transport: queued inbound messages, recorded outbound ones.
pub struct RecordingChannel {
    id: ChannelId,
    owner: String,
    tx: Mutex<Option<mpsc::Sender<Result<ChannelMessage, ChannelError>>>>,
    rx: Mutex<Option<mpsc::Receiver<Result<ChannelMessage, ChannelError>>>>,
    sent: Mutex<Vec<(String, String)>>,
    typing: Mutex<usize>,
    stopped: Mutex<bool>,
}

impl RecordingChannel {
    pub fn new(owner: &str) -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            id: ChannelId("recording".into()),
            owner: owner.into(),
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
            sent: Mutex::new(Vec::new()),
            typing: Mutex::new(0),
            stopped: Mutex::new(false),
        }
    }

    pub fn message(sender: &str, chat: &str, text: &str) -> ChannelMessage {
        ChannelMessage {
            channel_id: ChannelId("recording".into()),
            sender_id: sender.into(),
            sender_name: None,
            content: text.into(),
            chat_id: chat.into(),
            message_id: "1".into(),
        }
    }

    /// Queue an inbound message.
    pub fn push(&self, msg: ChannelMessage) {
        if let Some(tx) = self.tx.lock().unwrap().as_ref() {
            tx.try_send(Ok(msg)).unwrap();
        }
    }

    /// No more inbound messages; the receiver ends once drained.
    pub fn close(&self) {
        self.tx.lock().unwrap().take();
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn typing_count(&self) -> usize {
        *self.typing.lock().unwrap()
    }

    pub fn stopped(&self) -> bool {
        *self.stopped.lock().unwrap()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(&self) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        self.rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ChannelError::ConnectionLost("already started".into()))
    }

    async fn send(&self, chat_id: &str, content: &str) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), content.to_string()));
        Ok(())
    }

    async fn send_typing(&self, _chat_id: &str) -> Result<(), ChannelError> {
        *self.typing.lock().unwrap() += 1;
        Ok(())
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        sender_id == self.owner
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        *self.stopped.lock().unwrap() = true;
        Ok(())
    }
}
