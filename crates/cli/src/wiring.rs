//! Builds the pipeline from configuration.

use second_agent::{
    ChatPipeline, HealthAggregator, InferenceInvoker, IntentClassifier, IntentDispatcher,
    ParallelRetriever, PersistenceDispatcher, PromptBuilder, Responder, SourceSlot,
};
use second_config::{AppConfig, RoutingMode};
use second_memory::{ConversationHistory, LorClient, WatcherClient};
use second_providers::OllamaProvider;
use std::sync::Arc;
use tracing::info;

/// Source tag on every event this process writes.
const EVENT_SOURCE: &str = "telegram";

/// Everything the bot needs besides the transport.
pub struct Services {
    pub history: ConversationHistory,
    pub persistence: Arc<PersistenceDispatcher>,
    pub responder: Arc<dyn Responder>,
    pub health: HealthAggregator,
}

struct Backends {
    ollama: Arc<OllamaProvider>,
    watcher: Arc<WatcherClient>,
    lor: Arc<LorClient>,
}

impl Backends {
    fn from_config(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            ollama: Arc::new(OllamaProvider::from_config(&config.ollama)?),
            watcher: Arc::new(WatcherClient::from_config(config)),
            lor: Arc::new(LorClient::from_config(config)),
        })
    }

    fn health(&self, config: &AppConfig) -> HealthAggregator {
        HealthAggregator::from_config(config)
            .with_probe(self.ollama.clone())
            .with_probe(self.watcher.clone())
            .with_probe(self.lor.clone())
    }
}

pub fn build(config: &AppConfig) -> Result<Services, Box<dyn std::error::Error>> {
    let backends = Backends::from_config(config)?;

    let mut retriever = ParallelRetriever::from_config(config);
    if config.watcher.enabled {
        retriever = retriever.with_source(SourceSlot::new(
            backends.watcher.clone(),
            config.watcher.item_chars,
            config.watcher.budget_chars,
        ));
    }
    if config.lor.enabled {
        retriever = retriever.with_source(SourceSlot::new(
            backends.lor.clone(),
            config.lor.item_chars,
            config.lor.budget_chars,
        ));
    }

    let history = ConversationHistory::new(config.history.max_turns);
    let persistence = Arc::new(PersistenceDispatcher::new(
        backends.watcher.clone(),
        EVENT_SOURCE,
    ));
    let pipeline = Arc::new(ChatPipeline::new(
        retriever,
        PromptBuilder::from_config(config),
        InferenceInvoker::from_config(backends.ollama.clone(), config),
        history.clone(),
        persistence.clone(),
    ));

    let responder: Arc<dyn Responder> = match config.routing.mode {
        RoutingMode::Rag => pipeline,
        RoutingMode::Dispatch => Arc::new(IntentDispatcher::new(
            IntentClassifier::from_config(backends.ollama.clone(), config),
            pipeline,
            persistence.clone(),
        )),
    };
    info!(
        mode = ?config.routing.mode,
        model = %config.ollama.model,
        ollama = %config.ollama.url,
        watcher = %config.watcher.url,
        lor = %config.lor.url,
        "Pipeline ready"
    );

    Ok(Services {
        history,
        persistence,
        responder,
        health: backends.health(config),
    })
}

/// Just the health probes, for `second status`.
pub fn health(config: &AppConfig) -> Result<HealthAggregator, Box<dyn std::error::Error>> {
    Ok(Backends::from_config(config)?.health(config))
}
