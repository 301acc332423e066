//! Configuration loading, validation, and management for Second.
//!
//! Loads configuration from `~/.second/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! Every value has a default except the Telegram bot token, which the
//! `run` command demands through [`AppConfig::require_bot_token`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Rough characters-per-token ratio used for context budgeting.
///
/// Budgets are counted in characters, not tokens, so this is an
/// approximation; [`AppConfig::validate`] keeps a margin on top of it.
pub const CHARS_PER_TOKEN: f32 = 3.5;

/// Fraction of the backend context window the prompt may plan to use.
const CONTEXT_SAFETY_FACTOR: f32 = 0.9;

/// Characters reserved for context labels, the grounding instruction and
/// the degraded-mode note.
const PROMPT_SCAFFOLD_CHARS: usize = 300;

/// The root configuration structure.
///
/// Maps directly to `~/.second/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub watcher: WatcherConfig,

    #[serde(default)]
    pub lor: LorConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub identity: IdentityConfig,
}

fn default_true() -> bool {
    true
}

// ── Telegram ─────────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather. No default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// The single user id allowed to talk to the bot. Empty = deny all.
    #[serde(default)]
    pub authorized_user_id: String,

    /// Long-poll timeout for `getUpdates`
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Base URL of the Bot API
    #[serde(default = "default_telegram_api")]
    pub api_url: String,
}

fn default_poll_timeout() -> u64 {
    30
}
fn default_telegram_api() -> String {
    "https://api.telegram.org".into()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            authorized_user_id: String::new(),
            poll_timeout_secs: default_poll_timeout(),
            api_url: default_telegram_api(),
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field(
                "bot_token",
                &match self.bot_token {
                    Some(_) => "[REDACTED]",
                    None => "None",
                },
            )
            .field("authorized_user_id", &self.authorized_user_id)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("api_url", &self.api_url)
            .finish()
    }
}

// ── Ollama ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Inference timeout. Longer than every other timeout: first calls may
    /// include model loading.
    #[serde(default = "default_ollama_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,

    /// Maximum tokens generated per reply
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,

    /// Context window requested from the backend
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "qwen3:14b".into()
}
fn default_ollama_timeout() -> u64 {
    120
}
fn default_temperature() -> f32 {
    0.4
}
fn default_repeat_penalty() -> f32 {
    1.1
}
fn default_num_predict() -> u32 {
    512
}
fn default_num_ctx() -> u32 {
    2560
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_model(),
            timeout_secs: default_ollama_timeout(),
            temperature: default_temperature(),
            repeat_penalty: default_repeat_penalty(),
            num_predict: default_num_predict(),
            num_ctx: default_num_ctx(),
        }
    }
}

// ── Knowledge sources ────────────────────────────────────────────────────

/// Watcher: episodic memory search + event storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_watcher_url")]
    pub url: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_watcher_limit")]
    pub search_limit: usize,

    /// Per-snippet character cap
    #[serde(default = "default_watcher_item_chars")]
    pub item_chars: usize,

    /// Total characters of Watcher context per prompt
    #[serde(default = "default_watcher_budget")]
    pub budget_chars: usize,

    /// Timeout for event writes
    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,
}

fn default_watcher_url() -> String {
    "http://localhost:9100".into()
}
fn default_watcher_limit() -> usize {
    5
}
fn default_watcher_item_chars() -> usize {
    300
}
fn default_watcher_budget() -> usize {
    1400
}
fn default_store_timeout() -> u64 {
    10
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            url: default_watcher_url(),
            enabled: true,
            search_limit: default_watcher_limit(),
            item_chars: default_watcher_item_chars(),
            budget_chars: default_watcher_budget(),
            store_timeout_secs: default_store_timeout(),
        }
    }
}

/// LOR: reference knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LorConfig {
    #[serde(default = "default_lor_url")]
    pub url: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_lor_top_k")]
    pub top_k: usize,

    #[serde(default = "default_lor_item_chars")]
    pub item_chars: usize,

    #[serde(default = "default_lor_budget")]
    pub budget_chars: usize,
}

fn default_lor_url() -> String {
    "http://localhost:9000".into()
}
fn default_lor_top_k() -> usize {
    3
}
fn default_lor_item_chars() -> usize {
    400
}
fn default_lor_budget() -> usize {
    1000
}

impl Default for LorConfig {
    fn default() -> Self {
        Self {
            url: default_lor_url(),
            enabled: true,
            top_k: default_lor_top_k(),
            item_chars: default_lor_item_chars(),
            budget_chars: default_lor_budget(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Independent timeout per knowledge-source call
    #[serde(default = "default_retrieval_timeout")]
    pub timeout_secs: u64,

    /// Results scoring below this are discarded (boundary inclusive)
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f32,
}

fn default_retrieval_timeout() -> u64 {
    5
}
fn default_min_relevance() -> f32 {
    0.4
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_retrieval_timeout(),
            min_relevance: default_min_relevance(),
        }
    }
}

// ── Conversation ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Turns (single user or assistant entries) kept per chat
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Characters of history allowed into one prompt
    #[serde(default = "default_history_budget")]
    pub budget_chars: usize,
}

fn default_max_turns() -> usize {
    10
}
fn default_history_budget() -> usize {
    2400
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            budget_chars: default_history_budget(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Must stay below `ollama.timeout_secs`
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_classifier_tokens")]
    pub max_tokens: u32,
}

fn default_classifier_timeout() -> u64 {
    15
}
fn default_classifier_tokens() -> u32 {
    8
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_classifier_timeout(),
            max_tokens: default_classifier_tokens(),
        }
    }
}

/// How free-text messages are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Retrieve context, answer, persist the exchange
    #[default]
    Rag,
    /// Classify first: questions are answered, statements are stored
    Dispatch,
}

impl std::str::FromStr for RoutingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rag" => Ok(Self::Rag),
            "dispatch" => Ok(Self::Dispatch),
            other => Err(ConfigError::ValidationError(format!(
                "unknown routing mode '{other}' (expected 'rag' or 'dispatch')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub mode: RoutingMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,

    /// Dependencies reported but never allowed to degrade the composite
    #[serde(default = "default_informational")]
    pub informational: Vec<String>,
}

fn default_probe_timeout() -> u64 {
    5
}
fn default_informational() -> Vec<String> {
    vec!["watcher".into()]
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout(),
            informational: default_informational(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_assistant_name")]
    pub name: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_assistant_name() -> String {
    "Second".into()
}
fn default_system_prompt() -> String {
    "You are Second, a locally run assistant.\n\
     Be direct, grounded, truth-seeking. Prefer clarity over persuasion.\n\
     If uncertain, say you're uncertain and propose how to verify."
        .into()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            system_prompt: default_system_prompt(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from the default path (~/.second/config.toml),
    /// then apply process environment overrides:
    /// - `TELEGRAM_TOKEN`, `AUTHORIZED_USER_ID`
    /// - `OLLAMA_URL`, `OLLAMA_MODEL`, `OLLAMA_TIMEOUT`
    /// - `WATCHER_URL`, `LOR_URL`
    /// - `SECOND_ROUTING_MODE`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path` and apply process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load from `path`, apply overrides from `lookup`, then validate once.
    pub fn load_with<F>(path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a specific file path. Not validated: an
    /// override may still fix a file value.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production, a map in tests). Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("TELEGRAM_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(user) = get("AUTHORIZED_USER_ID") {
            self.telegram.authorized_user_id = user.trim().to_string();
        }
        if let Some(url) = get("OLLAMA_URL") {
            self.ollama.url = url;
        }
        if let Some(model) = get("OLLAMA_MODEL") {
            self.ollama.model = model;
        }
        if let Some(timeout) = get("OLLAMA_TIMEOUT") {
            self.ollama.timeout_secs = timeout.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "OLLAMA_TIMEOUT must be a whole number of seconds, got '{timeout}'"
                ))
            })?;
        }
        if let Some(url) = get("WATCHER_URL") {
            self.watcher.url = url;
        }
        if let Some(url) = get("LOR_URL") {
            self.lor.url = url;
        }
        if let Some(mode) = get("SECOND_ROUTING_MODE") {
            self.routing.mode = mode.parse()?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".second")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.ollama.temperature) {
            return Err(ConfigError::ValidationError(
                "ollama.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.retrieval.min_relevance) {
            return Err(ConfigError::ValidationError(
                "retrieval.min_relevance must be between 0.0 and 1.0".into(),
            ));
        }

        if self.history.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "history.max_turns must be > 0".into(),
            ));
        }

        if self.routing.mode == RoutingMode::Dispatch
            && self.classifier.timeout_secs >= self.ollama.timeout_secs
        {
            return Err(ConfigError::ValidationError(
                "classifier.timeout_secs must be shorter than ollama.timeout_secs".into(),
            ));
        }

        let planned = self.planned_prompt_tokens() + self.ollama.num_predict as usize;
        let ceiling = (self.ollama.num_ctx as f32 * CONTEXT_SAFETY_FACTOR) as usize;
        if planned > ceiling {
            return Err(ConfigError::ValidationError(format!(
                "context budgets plan ~{planned} tokens (prompt + num_predict) but only \
                 {ceiling} of num_ctx {} are usable; lower the character budgets or raise num_ctx",
                self.ollama.num_ctx
            )));
        }

        Ok(())
    }

    /// Estimated prompt tokens at full budgets, excluding the live user text.
    pub fn planned_prompt_tokens(&self) -> usize {
        let chars = self.identity.system_prompt.chars().count()
            + self.history.budget_chars
            + self.watcher.budget_chars
            + self.lor.budget_chars
            + PROMPT_SCAFFOLD_CHARS;
        (chars as f32 / CHARS_PER_TOKEN).ceil() as usize
    }

    /// The transport credential. Fails when unset; there is no default.
    pub fn require_bot_token(&self) -> Result<&str, ConfigError> {
        self.telegram
            .bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingRequired("TELEGRAM_TOKEN"))
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Render the config as TOML with the bot token masked.
    pub fn redacted_toml(&self) -> String {
        let mut shown = self.clone();
        if shown.telegram.bot_token.is_some() {
            shown.telegram.bot_token = Some("[REDACTED]".into());
        }
        toml::to_string_pretty(&shown).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            ollama: OllamaConfig::default(),
            watcher: WatcherConfig::default(),
            lor: LorConfig::default(),
            retrieval: RetrievalConfig::default(),
            history: HistoryConfig::default(),
            classifier: ClassifierConfig::default(),
            routing: RoutingConfig::default(),
            health: HealthConfig::default(),
            identity: IdentityConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Required setting {0} is not set")]
    MissingRequired(&'static str),
}
