//! Knowledge handler: retrieval-augmented answers from the indexed help
//! center.
//!
//! # Flow
//!
//! 1. Refuse early while the knowledge base is not ready
//! 2. Retrieve the top-k chunks above the similarity threshold
//! 3. Build a prompt with the numbered chunks plus recent conversation turns
//! 4. Generate an answer grounded in those chunks
//! 5. Return the answer with the de-duplicated source URLs
//!
//! With no passing chunks the model answers generically and the response
//! is flagged with `no_sources_found` instead of claiming sources.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use switchyard_core::agent::{AgentKind, AgentResponse, Handler};
use switchyard_core::error::{Error, Result};
use switchyard_core::index::ScoredChunk;
use switchyard_core::message::{ConversationContext, Sender};
use switchyard_core::provider::{PromptMessage, Provider, ProviderRequest, Role};
use switchyard_knowledge::{KnowledgeState, KnowledgeStatus, Retriever};
use tracing::{debug, info, warn};

const GROUNDED_PROMPT: &str = "You are a customer support assistant for a payments company. \
Answer the user's question using only the numbered context passages. If the passages do not \
contain the answer, say so. Be concise and reply in the language of the question.";

const GENERIC_PROMPT: &str = "You are a customer support assistant for a payments company. \
No help-center article matched this question. Give a short, general answer, do not cite \
sources and do not invent specific fees, rates or policies.";

pub struct KnowledgeHandler {
    /// LLM provider used for generation.
    provider: Arc<dyn Provider>,
    /// Chat model name.
    model: String,
    retriever: Arc<Retriever>,
    /// Readiness of the index, driven by the ingestion job.
    status: Arc<KnowledgeStatus>,
    top_k: usize,
    temperature: f32,
    /// Prior conversation messages included in the prompt.
    history_window: usize,
    timeout: Duration,
}

impl KnowledgeHandler {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        retriever: Arc<Retriever>,
        status: Arc<KnowledgeStatus>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            retriever,
            status,
            top_k: 5,
            temperature: 0.3,
            history_window: 6,
            timeout,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window;
        self
    }

    fn unavailable(&self, error: &Error, knowledge_status: &str, started: Instant) -> AgentResponse {
        AgentResponse::new(AgentKind::Knowledge, error.public_message())
            .with_metadata("knowledge_status", knowledge_status)
            .with_metadata("error_code", error.code())
            .with_execution_time(started.elapsed().as_secs_f64())
    }

    fn history(&self, context: &ConversationContext) -> Vec<PromptMessage> {
        context
            .recent(self.history_window)
            .iter()
            .map(|m| PromptMessage {
                role: match m.sender {
                    Sender::User => Role::User,
                    Sender::Agent => Role::Assistant,
                },
                content: m.content.clone(),
            })
            .collect()
    }

    async fn generate(
        &self,
        system: &str,
        user: String,
        context: &ConversationContext,
    ) -> Result<String> {
        let mut messages = vec![PromptMessage::system(system)];
        messages.extend(self.history(context));
        messages.push(PromptMessage::user(user));

        let request = ProviderRequest::new(self.model.clone(), messages)
            .with_temperature(self.temperature);
        Ok(self.provider.generate(request, self.timeout).await?)
    }
}

/// The numbered context block and question handed to the model.
pub fn build_prompt(question: &str, chunks: &[ScoredChunk]) -> String {
    let mut prompt = String::from("Context:\n");
    for (i, scored) in chunks.iter().enumerate() {
        let chunk = &scored.chunk;
        let title = if chunk.title.is_empty() { "Untitled" } else { chunk.title.as_str() };
        prompt.push_str(&format!("[{}] {} ({})\n{}\n\n", i + 1, title, chunk.source_url, chunk.text));
    }
    prompt.push_str(&format!("Question: {question}"));
    prompt
}

/// Source URLs in first-seen order.
pub fn unique_sources(chunks: &[ScoredChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for scored in chunks {
        if !sources.contains(&scored.chunk.source_url) {
            sources.push(scored.chunk.source_url.clone());
        }
    }
    sources
}

#[async_trait]
impl Handler for KnowledgeHandler {
    fn kind(&self) -> AgentKind {
        AgentKind::Knowledge
    }

    async fn handle(&self, message: &str, context: &ConversationContext) -> Result<AgentResponse> {
        let started = Instant::now();

        // ── Step 1: Readiness ──
        match self.status.state() {
            KnowledgeState::Ready => {}
            KnowledgeState::NotReady | KnowledgeState::Building => {
                info!("Knowledge: index not ready yet");
                return Ok(self.unavailable(&Error::KnowledgeNotReady, "not_ready", started));
            }
            KnowledgeState::Failed => {
                let error = Error::Index(switchyard_core::error::IndexError::Unavailable(
                    "initial ingestion failed".into(),
                ));
                return Ok(self.unavailable(&error, "unavailable", started));
            }
        }

        // ── Step 2: Retrieve ──
        let chunks = match self.retriever.query(message, self.top_k).await {
            Ok(chunks) => chunks,
            Err(e @ Error::Index(_)) => {
                warn!(error = %e, "Knowledge: index unavailable");
                return Ok(self.unavailable(&e, "unavailable", started));
            }
            Err(e) => return Err(e),
        };
        debug!(chunks = chunks.len(), "Knowledge: chunks retrieved");

        // ── Step 3: Generate ──
        if chunks.is_empty() {
            info!(model = %self.model, "Knowledge: no sources above threshold, answering generically");
            let answer = self.generate(GENERIC_PROMPT, message.to_string(), context).await?;
            return Ok(AgentResponse::new(AgentKind::Knowledge, answer)
                .with_metadata("no_sources_found", true)
                .with_metadata("chunks_used", 0)
                .with_metadata("knowledge_status", "ready")
                .with_metadata("model", self.model.clone())
                .with_execution_time(started.elapsed().as_secs_f64()));
        }

        let top_similarity = chunks.first().map(|c| f64::from(c.similarity)).unwrap_or(0.0);
        let answer = self
            .generate(GROUNDED_PROMPT, build_prompt(message, &chunks), context)
            .await?;
        info!(model = %self.model, chunks = chunks.len(), "Knowledge: grounded answer generated");

        Ok(AgentResponse::new(AgentKind::Knowledge, answer)
            .with_sources(unique_sources(&chunks))
            .with_metadata("no_sources_found", false)
            .with_metadata("chunks_used", chunks.len())
            .with_metadata("top_similarity", top_similarity)
            .with_metadata("knowledge_status", "ready")
            .with_metadata("model", self.model.clone())
            .with_execution_time(started.elapsed().as_secs_f64()))
    }
}
