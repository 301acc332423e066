//! Intent classification for the dispatcher.
//!
//! A single zero-temperature call asks the backend for one label. The
//! outcome is `Classified` when a label was read from the reply and
//! `Fallback(Question)` for anything else: transport failure, timeout,
//! empty or unrecognized output. Sending a statement down the question
//! path still produces an answer; sending a question to storage would
//! silently drop it.

use second_core::message::Message;
use second_core::provider::{DecodingOptions, Provider, ProviderRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const CLASSIFY_INSTRUCTION: &str = "Classify the user's message. \
     Reply with exactly one word: QUESTION if it asks for information, an answer or help; \
     STATEMENT if it asserts a fact, a plan or a note to remember. \
     No punctuation, no explanation.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Answer it through the inference path
    Question,
    /// Store it in memory
    Statement,
}

impl Intent {
    /// Used whenever the label cannot be determined.
    pub const DEFAULT: Intent = Intent::Question;

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Question => "question",
            Intent::Statement => "statement",
        }
    }
}

/// The terminal state of one classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Classified(Intent),
    Fallback(Intent),
}

impl Classification {
    pub fn intent(&self) -> Intent {
        match self {
            Classification::Classified(i) | Classification::Fallback(i) => *i,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Classification::Fallback(_))
    }
}

pub struct IntentClassifier {
    provider: Arc<dyn Provider>,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 8,
            timeout,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &second_config::AppConfig) -> Self {
        Self {
            provider,
            model: config.ollama.model.clone(),
            max_tokens: config.classifier.max_tokens,
            timeout: Duration::from_secs(config.classifier.timeout_secs),
        }
    }

    pub async fn classify(&self, text: &str) -> Classification {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::system(CLASSIFY_INSTRUCTION), Message::user(text)],
            options: DecodingOptions::deterministic(self.max_tokens),
        };

        let raw = match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(Ok(response)) => response.content,
            Ok(Err(e)) => {
                warn!(error = %e, "Classifier call failed, using default intent");
                return Classification::Fallback(Intent::DEFAULT);
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Classifier timed out, using default intent"
                );
                return Classification::Fallback(Intent::DEFAULT);
            }
        };

        match parse_label(&raw) {
            Some(intent) => {
                debug!(intent = intent.as_str(), "Message classified");
                Classification::Classified(intent)
            }
            None => {
                warn!(raw = %raw.chars().take(80).collect::<String>(), "Unrecognized classifier label");
                Classification::Fallback(Intent::DEFAULT)
            }
        }
    }
}

/// First recognizable label in the reply, ignoring case, punctuation and
/// any reasoning block.
pub fn parse_label(raw: &str) -> Option<Intent> {
    strip_think(raw)
        .split(|c: char| !c.is_ascii_alphabetic())
        .find_map(|token| {
            if token.eq_ignore_ascii_case("question") {
                Some(Intent::Question)
            } else if token.eq_ignore_ascii_case("statement") {
                Some(Intent::Statement)
            } else {
                None
            }
        })
}

/// Remove `<think>…</think>` blocks. An unclosed block swallows the rest.
fn strip_think(raw: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        match rest[start..].find(CLOSE) {
            Some(end) => rest = &rest[start + end + CLOSE.len()..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use second_core::error::ProviderError;

    fn classifier(provider: ScriptedProvider) -> (Arc<ScriptedProvider>, IntentClassifier) {
        let provider = Arc::new(provider);
        let c = IntentClassifier::new(provider.clone(), "m", Duration::from_secs(15));
        (provider, c)
    }

    #[test]
    fn parses_labels_loosely() {
        assert_eq!(parse_label("QUESTION"), Some(Intent::Question));
        assert_eq!(parse_label("  statement.\n"), Some(Intent::Statement));
        assert_eq!(parse_label("Statement: yes"), Some(Intent::Statement));
        assert_eq!(parse_label("label=question"), Some(Intent::Question));
        assert_eq!(parse_label(""), None);
        assert_eq!(parse_label("maybe"), None);
        // substrings do not count
        assert_eq!(parse_label("questionable"), None);
    }

    #[test]
    fn first_label_wins() {
        assert_eq!(parse_label("statement or question"), Some(Intent::Statement));
    }

    #[test]
    fn think_blocks_are_ignored() {
        assert_eq!(
            parse_label("<think>is this a question?</think>\nSTATEMENT"),
            Some(Intent::Statement)
        );
        assert_eq!(parse_label("<think>question question"), None);
    }

    #[tokio::test]
    async fn classified_statement() {
        let (provider, c) = classifier(ScriptedProvider::replies(&["STATEMENT"]));
        let outcome = c.classify("The pour is Friday at 8am").await;
        assert_eq!(outcome, Classification::Classified(Intent::Statement));

        let request = provider.last_request().unwrap();
        assert_eq!(request.options.temperature, 0.0);
        assert_eq!(request.options.max_tokens, 8);
        assert_eq!(request.messages.last().unwrap().content(), "The pour is Friday at 8am");
    }

    #[tokio::test]
    async fn transport_failure_falls_back_to_question() {
        let (_, c) = classifier(ScriptedProvider::failing(ProviderError::Connect("refused".into())));
        let outcome = c.classify("The pour is Friday at 8am").await;
        assert_eq!(outcome, Classification::Fallback(Intent::Question));
        assert!(outcome.is_fallback());
    }

    #[tokio::test]
    async fn unrecognized_reply_falls_back_deterministically() {
        for reply in ["", "   ", "I think it is a note", "<think></think>"] {
            let (_, c) = classifier(ScriptedProvider::replies(&[reply]));
            assert_eq!(c.classify("x").await, Classification::Fallback(Intent::Question));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back() {
        let (_, c) = classifier(ScriptedProvider::replies(&["STATEMENT"]).with_delay(Duration::from_secs(60)));
        let outcome = c.classify("x").await;
        assert_eq!(outcome, Classification::Fallback(Intent::Question));
    }
}
