//! The orchestrator: one chat turn from raw request to `ChatResponse`.
//!
//! # Flow
//!
//! 1. Validate the user and conversation ids
//! 2. Sanitize the message through the security gate
//! 3. Load the conversation (or start a new, unsaved one)
//! 4. Route to an agent and dispatch its handler
//! 5. Persist the user message and the agent reply
//! 6. Assemble the response with the two-step agent workflow
//!
//! Every stage reports a structured entry. Only validation failures are
//! returned as `Err`; handler failures become a user-safe reply carrying the
//! stable error code in the response metadata.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use switchyard_core::agent::{AgentDecision, AgentKind, AgentResponse, Handler};
use switchyard_core::chat::{ChatRequest, ChatResponse, WorkflowStep};
use switchyard_core::error::{Error, Result, StoreError, ValidationError};
use switchyard_core::message::{ConversationContext, Message};
use switchyard_core::store::ConversationStore;
use switchyard_security::{validate_conversation_id, validate_user_id, SecurityGate};
use switchyard_telemetry::{preview, LogEntry, Stage, StructuredLogger};
use tracing::{info, warn};

use crate::router::Router;

const COMPONENT: &str = "orchestrator";
const ROUTER_AGENT: &str = "RouterAgent";

/// Everything one turn produced, for callers that need more than the wire
/// response (the CLI prints the decision and sources).
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub request_id: String,
    pub response: ChatResponse,
    pub decision: AgentDecision,
    pub agent_response: AgentResponse,
}

pub struct Orchestrator {
    gate: Arc<SecurityGate>,
    router: Router,
    handlers: HashMap<AgentKind, Arc<dyn Handler>>,
    store: Arc<dyn ConversationStore>,
    logger: Arc<StructuredLogger>,
}

impl Orchestrator {
    pub fn new(
        gate: Arc<SecurityGate>,
        router: Router,
        store: Arc<dyn ConversationStore>,
        logger: Arc<StructuredLogger>,
    ) -> Self {
        Self {
            gate,
            router,
            handlers: HashMap::new(),
            store,
            logger,
        }
    }

    /// Register the handler for its [`AgentKind`], replacing any previous one.
    pub fn with_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.insert(handler.kind(), handler);
        self
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn logger(&self) -> &Arc<StructuredLogger> {
        &self.logger
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Process one chat message under a fresh request id.
    pub async fn handle_chat(
        &self,
        message: &str,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<ChatResponse> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let request = ChatRequest::new(message, user_id, conversation_id);
        Ok(self.run_turn(&request, &request_id).await?.response)
    }

    /// Process one chat request under a caller-supplied request id.
    pub async fn handle_request(&self, request: &ChatRequest, request_id: &str) -> Result<ChatResponse> {
        Ok(self.run_turn(request, request_id).await?.response)
    }

    /// Process one chat request and keep the intermediate results.
    pub async fn run_turn(&self, request: &ChatRequest, request_id: &str) -> Result<TurnOutcome> {
        let started = Instant::now();
        let user_id = request.user_id.as_str();
        let conversation_id = request.conversation_id.as_str();

        // ── Step 1: Identifiers ──
        if let Err(e) = validate_user_id(user_id).and_then(|_| validate_conversation_id(conversation_id)) {
            self.logger.log(
                LogEntry::warn(Stage::Security, COMPONENT, "Identifier rejected")
                    .with_request(request_id)
                    .with_field("code", e.code.as_str()),
            );
            return Err(e.into());
        }

        // ── Step 2: Sanitize ──
        let message = self.gate.sanitize_request(&request.message, Some(request_id))?;

        // ── Step 3: Conversation ──
        let (context, existing) = match self.store.get(conversation_id).await {
            Ok(Some(context)) => (context, true),
            Ok(None) => (ConversationContext::new(conversation_id, user_id), false),
            Err(e) => {
                warn!(error = %e, "Conversation store read failed, continuing without history");
                self.logger.log(
                    LogEntry::warn(Stage::Persistence, COMPONENT, "Conversation load failed")
                        .with_request(request_id)
                        .with_conversation(conversation_id)
                        .with_field("error", e.to_string()),
                );
                (ConversationContext::new(conversation_id, user_id), false)
            }
        };
        if context.user_id != user_id {
            return Err(self.ownership_conflict(user_id, conversation_id, request_id));
        }

        // ── Step 4: Route ──
        let decision = self.router.route(&message, &context);
        self.logger.log(
            LogEntry::info(Stage::Routing, "router", "Routing decision")
                .with_request(request_id)
                .with_user(user_id)
                .with_conversation(conversation_id)
                .with_field("agent", decision.selected_agent.to_string())
                .with_field("confidence", decision.confidence)
                .with_field("fallback", decision.fallback)
                .with_field("signals", decision.signals.clone()),
        );

        // ── Step 5: Dispatch ──
        let agent_response = self.dispatch(&decision, &message, &context, request_id).await?;

        // ── Step 6: Persist ──
        self.persist(&context, existing, &message, &agent_response, request_id).await?;

        // ── Step 7: Respond ──
        let response = ChatResponse {
            response: agent_response.content.clone(),
            source_agent_response: format!(
                "{} (confidence: {:.2})",
                agent_response.source_agent.display_name(),
                decision.confidence
            ),
            agent_workflow: workflow(&decision, &agent_response),
        };

        self.logger.log(
            LogEntry::info(Stage::Response, COMPONENT, "Response sent")
                .with_request(request_id)
                .with_user(user_id)
                .with_conversation(conversation_id)
                .with_field("agent", agent_response.source_agent.to_string())
                .with_field("confidence", decision.confidence)
                .with_field("response_preview", preview(&agent_response.content, 80))
                .with_duration(started.elapsed()),
        );
        info!(
            request_id,
            agent = %agent_response.source_agent,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Chat turn complete"
        );

        Ok(TurnOutcome {
            request_id: request_id.to_string(),
            response,
            decision,
            agent_response,
        })
    }

    async fn dispatch(
        &self,
        decision: &AgentDecision,
        message: &str,
        context: &ConversationContext,
        request_id: &str,
    ) -> Result<AgentResponse> {
        let agent = decision.selected_agent;
        let started = Instant::now();

        let result = match self.handlers.get(&agent) {
            Some(handler) => handler.handle(message, context).await,
            None => Err(Error::Internal(format!("no handler registered for {agent}"))),
        };
        let elapsed = started.elapsed();

        match result {
            Ok(response) => {
                let mut entry = LogEntry::info(Stage::Handler, agent.display_name(), "Handler completed")
                    .with_request(request_id)
                    .with_conversation(&context.conversation_id)
                    .with_field("no_sources_found", response.no_sources_found())
                    .with_duration(elapsed);
                if let Some(status) = response.metadata.get("knowledge_status") {
                    entry = entry.with_field("knowledge_status", status.clone());
                }
                if let Some(sources) = &response.sources {
                    entry = entry.with_field("sources", sources.len());
                }
                self.logger.log(entry);
                Ok(response.with_execution_time(elapsed.as_secs_f64()))
            }
            Err(e) if e.is_client_error() => Err(e),
            Err(e) => {
                warn!(agent = %agent, code = e.code(), error = %e, "Handler failed");
                self.logger.log(
                    LogEntry::error(Stage::Handler, agent.display_name(), "Handler failed")
                        .with_request(request_id)
                        .with_conversation(&context.conversation_id)
                        .with_field("code", e.code())
                        .with_field("error", e.to_string())
                        .with_duration(elapsed),
                );
                Ok(AgentResponse::new(agent, e.public_message())
                    .with_metadata("error_code", e.code())
                    .with_execution_time(elapsed.as_secs_f64()))
            }
        }
    }

    /// Store the turn. Store failures are logged and never fail the request.
    ///
    /// A new conversation is claimed through the store's atomic
    /// get-or-create; when a concurrent first turn from another user won that
    /// race, nothing is appended and the turn is rejected like any other
    /// ownership mismatch.
    async fn persist(
        &self,
        context: &ConversationContext,
        existing: bool,
        message: &str,
        response: &AgentResponse,
        request_id: &str,
    ) -> Result<()> {
        let started = Instant::now();
        let conversation_id = context.conversation_id.as_str();
        let user_id = context.user_id.as_str();

        let result = async {
            if !existing {
                let stored = self
                    .store
                    .create(ConversationContext::new(conversation_id, user_id))
                    .await?;
                if stored.user_id != user_id {
                    return Ok(false);
                }
            }
            self.store.append(conversation_id, Message::user(message)).await?;
            self.store
                .append(
                    conversation_id,
                    Message::agent(response.content.clone(), response.source_agent),
                )
                .await?;
            Ok::<bool, StoreError>(true)
        }
        .await;

        let entry = match result {
            Ok(true) => LogEntry::info(Stage::Persistence, COMPONENT, "Conversation updated")
                .with_field("created", !existing)
                .with_field("messages_appended", 2),
            Ok(false) => return Err(self.ownership_conflict(user_id, conversation_id, request_id)),
            Err(e) => {
                warn!(error = %e, "Conversation persistence failed");
                LogEntry::error(Stage::Persistence, COMPONENT, "Conversation persistence failed")
                    .with_field("code", Error::from(e.clone()).code())
                    .with_field("error", e.to_string())
            }
        };
        self.logger.log(
            entry
                .with_request(request_id)
                .with_user(user_id)
                .with_conversation(conversation_id)
                .with_duration(started.elapsed()),
        );
        Ok(())
    }

    fn ownership_conflict(&self, user_id: &str, conversation_id: &str, request_id: &str) -> Error {
        self.logger.log(
            LogEntry::warn(Stage::Security, COMPONENT, "Conversation owned by another user")
                .with_request(request_id)
                .with_user(user_id)
                .with_conversation(conversation_id),
        );
        ValidationError::not_owner().into()
    }
}

/// The router step followed by the handler step.
fn workflow(decision: &AgentDecision, response: &AgentResponse) -> Vec<WorkflowStep> {
    let mut routed = format!(
        "Routed to {} with {:.2} confidence",
        decision.selected_agent.display_name(),
        decision.confidence
    );
    if decision.fallback {
        routed.push_str(" (fallback)");
    }

    let processed = match response.metadata.get("error_code").and_then(|v| v.as_str()) {
        Some(code) => format!("Failed with {code} after {:.3}s", response.execution_time),
        None => format!("Processed query in {:.3}s", response.execution_time),
    };

    vec![
        WorkflowStep {
            agent: ROUTER_AGENT.into(),
            decision: routed,
        },
        WorkflowStep {
            agent: response.source_agent.display_name().into(),
            decision: processed,
        },
    ]
}
