//! Runtime assembly: builds the whole chat pipeline from an [`AppConfig`].
//!
//! Production wiring picks the provider from configuration, fetches pages
//! over HTTP and persists the vector index when `knowledge.index_path` is
//! set. Tests inject deterministic doubles through [`RuntimeBuilder`].

use std::sync::Arc;
use std::time::Duration;

use switchyard_config::AppConfig;
use switchyard_core::error::Result;
use switchyard_core::fetch::PageFetcher;
use switchyard_core::index::VectorIndex;
use switchyard_core::provider::Provider;
use switchyard_core::store::ConversationStore;
use switchyard_knowledge::{
    CorpusBuilder, HttpFetcher, IngestionJob, IngestionReport, KnowledgeStatus, Retriever,
};
use switchyard_memory::{FileVectorIndex, InMemoryConversationStore, InMemoryVectorIndex};
use switchyard_providers::{build_from_config, ProviderMode};
use switchyard_security::SecurityGate;
use switchyard_telemetry::StructuredLogger;
use tokio::task::JoinHandle;
use tracing::info;

use crate::handlers::{KnowledgeHandler, MathHandler};
use crate::orchestrator::Orchestrator;
use crate::router::Router;

/// The assembled service: orchestrator plus the shared resources the
/// HTTP surface and the CLI need direct access to.
pub struct AgentRuntime {
    config: AppConfig,
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn ConversationStore>,
    index: Arc<dyn VectorIndex>,
    ingestion: Arc<IngestionJob>,
    logger: Arc<StructuredLogger>,
    provider_name: String,
    provider_mode: ProviderMode,
}

/// Optional overrides for [`AgentRuntime`] construction.
pub struct RuntimeBuilder {
    config: AppConfig,
    provider: Option<Arc<dyn Provider>>,
    fetcher: Option<Arc<dyn PageFetcher>>,
    index: Option<Arc<dyn VectorIndex>>,
    store: Option<Arc<dyn ConversationStore>>,
    logger: Option<Arc<StructuredLogger>>,
}

impl RuntimeBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            provider: None,
            fetcher: None,
            index: None,
            store: None,
            logger: None,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_logger(mut self, logger: Arc<StructuredLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub async fn build(self) -> AgentRuntime {
        let config = self.config;
        let logger = self
            .logger
            .unwrap_or_else(|| Arc::new(StructuredLogger::with_tracing(config.logging.buffer_size)));

        // ── Provider ──
        let (provider, provider_mode) = match self.provider {
            Some(provider) => {
                let mode = if provider.name() == "mock" {
                    ProviderMode::Mock
                } else {
                    ProviderMode::Live
                };
                (provider, mode)
            }
            None => {
                let selection = build_from_config(&config);
                (selection.provider, selection.mode)
            }
        };
        let provider_name = provider.name().to_string();

        // ── Vector index ──
        let index: Arc<dyn VectorIndex> = match (self.index, &config.knowledge.index_path) {
            (Some(index), _) => index,
            (None, Some(path)) => Arc::new(FileVectorIndex::open(path.clone()).await),
            (None, None) => Arc::new(InMemoryVectorIndex::new()),
        };
        let preloaded = index.count().await.unwrap_or(0);
        let status = Arc::new(if preloaded > 0 {
            info!(chunks = preloaded, backend = index.name(), "Serving persisted knowledge index");
            KnowledgeStatus::ready()
        } else {
            KnowledgeStatus::new()
        });

        // ── Knowledge pipeline ──
        let fetcher: Arc<dyn PageFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(
                &config.knowledge.user_agent,
                Duration::from_secs(config.knowledge.fetch_timeout_secs),
            )),
        };
        let builder = CorpusBuilder::new(
            fetcher,
            provider.clone(),
            index.clone(),
            &config.knowledge,
            config.embedding_model.clone(),
            logger.clone(),
        );
        let ingestion = Arc::new(IngestionJob::new(Arc::new(builder), status.clone()));
        let timeout = config.request_timeout();
        let retriever = Arc::new(
            Retriever::new(
                provider.clone(),
                index.clone(),
                config.embedding_model.clone(),
                config.knowledge.min_similarity,
                logger.clone(),
            )
            .with_embed_timeout(timeout),
        );

        // ── Handlers and orchestrator ──
        let math = MathHandler::new(
            provider.clone(),
            config.default_model.clone(),
            config.math.clone(),
            timeout,
        );
        let knowledge = KnowledgeHandler::new(
            provider,
            config.default_model.clone(),
            retriever,
            status,
            timeout,
        )
        .with_top_k(config.knowledge.top_k)
        .with_temperature(config.knowledge.temperature)
        .with_history_window(config.conversations.history_window);

        let store: Arc<dyn ConversationStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryConversationStore::new(Duration::from_secs(
                config.conversations.ttl_secs,
            ))),
        };
        let orchestrator = Orchestrator::new(
            Arc::new(SecurityGate::new(&config.security, logger.clone())),
            Router::new(config.router.clone()),
            store.clone(),
            logger.clone(),
        )
        .with_handler(Arc::new(math))
        .with_handler(Arc::new(knowledge));

        info!(
            provider = %provider_name,
            mode = ?provider_mode,
            model = %config.default_model,
            index = index.name(),
            "Runtime assembled"
        );

        AgentRuntime {
            config,
            orchestrator: Arc::new(orchestrator),
            store,
            index,
            ingestion,
            logger,
            provider_name,
            provider_mode,
        }
    }
}

impl AgentRuntime {
    /// Build with production defaults for everything.
    pub async fn from_config(config: AppConfig) -> Self {
        RuntimeBuilder::new(config).build().await
    }

    pub fn builder(config: AppConfig) -> RuntimeBuilder {
        RuntimeBuilder::new(config)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn ingestion(&self) -> &Arc<IngestionJob> {
        &self.ingestion
    }

    pub fn knowledge_status(&self) -> &Arc<KnowledgeStatus> {
        self.ingestion.status()
    }

    pub fn logger(&self) -> &Arc<StructuredLogger> {
        &self.logger
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn provider_mode(&self) -> ProviderMode {
        self.provider_mode
    }

    /// Periodic refresh interval, if one is configured.
    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.config.knowledge.refresh_interval_minutes {
            0 => None,
            minutes => Some(Duration::from_secs(minutes * 60)),
        }
    }

    /// Start ingestion in the background with the configured refresh.
    pub fn start_background_ingestion(&self) -> JoinHandle<()> {
        self.ingestion.clone().spawn(self.refresh_interval())
    }

    /// Run one ingestion to completion.
    pub async fn ingest_now(&self) -> Result<IngestionReport> {
        self.ingestion.run().await
    }
}
