//! REST endpoints.
//!
//! - `POST /chat`: Run one chat turn
//! - `GET  /health`: Liveness plus provider/knowledge state
//! - `GET  /users/{user_id}/conversations?user_id=`: A user's conversations
//! - `GET  /conversations/{id}?user_id=`: One conversation with its history
//!
//! The conversation reads name their caller in the `user_id` query
//! parameter and only ever return that caller's own conversations.
//! - `POST /knowledge/ingest`: Start an ingestion run
//! - `GET  /knowledge/status`: Knowledge base readiness

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use switchyard_core::chat::{ChatRequest, ChatResponse, ErrorBody};
use switchyard_core::error::{Error, ValidationCode, ValidationError};
use switchyard_core::message::ConversationContext;
use switchyard_knowledge::KnowledgeSnapshot;
use switchyard_security::{validate_conversation_id, validate_user_id};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::SharedState;

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .route("/users/{user_id}/conversations", get(list_conversations_handler))
        .route("/conversations/{id}", get(get_conversation_handler))
        .route("/knowledge/ingest", post(ingest_handler))
        .route("/knowledge/status", get(knowledge_status_handler))
        .with_state(state)
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub provider: String,
    pub knowledge: String,
    pub store: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub message_count: usize,
    pub created_at: String,
    pub last_activity: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationListResponse {
    pub user_id: String,
    pub conversations: Vec<ConversationSummary>,
}

/// The caller of a conversation read.
#[derive(Debug, Deserialize)]
pub struct CallerQuery {
    pub user_id: Option<String>,
}

impl CallerQuery {
    /// The validated caller id; a read without one is rejected.
    fn user_id(&self, request_id: &str) -> Result<&str, ApiError> {
        let user_id = self.user_id.as_deref().unwrap_or_default();
        validate_user_id(user_id).map_err(|e| ApiError::from_error(&e.into(), request_id))?;
        Ok(user_id)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestAccepted {
    pub status: String,
    pub root_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KnowledgeStatusResponse {
    #[serde(flatten)]
    pub snapshot: KnowledgeSnapshot,
    pub chunks: usize,
    pub ingestion_running: bool,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request_id = new_request_id();
    let Json(request) = payload.map_err(|rejection| {
        warn!(request_id = %request_id, error = %rejection.body_text(), "Rejected chat body");
        ApiError::from_rejection(&rejection, &request_id)
    })?;

    info!(request_id = %request_id, message_chars = request.message.chars().count(), "Chat request");

    state
        .runtime
        .orchestrator()
        .handle_request(&request, &request_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_error(&e, &request_id))
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let runtime = &state.runtime;
    let store_ok = runtime.store().health_check().await.unwrap_or(false);
    let knowledge = runtime.knowledge_status().state();

    let uptime = chrono::Utc::now()
        .signed_duration_since(state.start_time)
        .num_seconds()
        .max(0) as u64;

    Json(HealthResponse {
        status: if store_ok { "ok" } else { "degraded" }.into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: uptime,
        provider: runtime.provider_name().into(),
        knowledge: knowledge.to_string(),
        store: if store_ok { "ok" } else { "unavailable" }.into(),
    })
}

async fn list_conversations_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Query(caller): Query<CallerQuery>,
) -> Result<Json<ConversationListResponse>, ApiError> {
    let request_id = new_request_id();
    validate_user_id(&user_id).map_err(|e| ApiError::from_error(&e.into(), &request_id))?;
    if caller.user_id(&request_id)? != user_id {
        warn!(request_id = %request_id, "Conversation list requested for another user");
        let err = ValidationError::new(ValidationCode::InvalidUserId, "Conversations can only be listed by their owner.");
        return Err(ApiError::from_error(&err.into(), &request_id));
    }

    let conversations = state
        .runtime
        .store()
        .list_by_user(&user_id)
        .await
        .map_err(|e| ApiError::from_error(&Error::from(e), &request_id))?;

    Ok(Json(ConversationListResponse {
        user_id,
        conversations: conversations
            .iter()
            .map(|c| ConversationSummary {
                conversation_id: c.conversation_id.clone(),
                message_count: c.message_history.len(),
                created_at: c.created_at.to_rfc3339(),
                last_activity: c.last_activity.to_rfc3339(),
            })
            .collect(),
    }))
}

async fn get_conversation_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(caller): Query<CallerQuery>,
) -> Result<Json<ConversationContext>, ApiError> {
    let request_id = new_request_id();
    validate_conversation_id(&id).map_err(|e| ApiError::from_error(&e.into(), &request_id))?;
    let user_id = caller.user_id(&request_id)?;

    let context = state
        .runtime
        .store()
        .get(&id)
        .await
        .map_err(|e| ApiError::from_error(&Error::from(e), &request_id))?
        .ok_or_else(|| ApiError::not_found("Conversation", &request_id))?;

    if context.user_id != user_id {
        warn!(request_id = %request_id, "Conversation read by another user");
        return Err(ApiError::from_error(&ValidationError::not_owner().into(), &request_id));
    }
    Ok(Json(context))
}

async fn ingest_handler(
    State(state): State<SharedState>,
) -> Result<(StatusCode, Json<IngestAccepted>), ApiError> {
    let job = state.runtime.ingestion().clone();
    let root_url = job.builder().root_url().to_string();
    if job.try_spawn().is_none() {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            ErrorBody::new(
                "INGESTION_RUNNING",
                "An ingestion run is already in progress.",
                new_request_id(),
            ),
        ));
    }
    info!(root_url = %root_url, "Ingestion started");

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestAccepted {
            status: "started".into(),
            root_url,
        }),
    ))
}

async fn knowledge_status_handler(State(state): State<SharedState>) -> Json<KnowledgeStatusResponse> {
    let runtime = &state.runtime;
    Json(KnowledgeStatusResponse {
        snapshot: runtime.knowledge_status().snapshot(),
        chunks: runtime.index().count().await.unwrap_or(0),
        ingestion_running: runtime.ingestion().is_running(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_router, GatewayState};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use switchyard_agent::AgentRuntime;
    use switchyard_config::AppConfig;
    use switchyard_knowledge::{FixtureFetcher, KnowledgeState};
    use switchyard_providers::MockProvider;
    use tower::ServiceExt;

    const ROOT: &str = "https://help.example.com/";

    async fn test_state(config: AppConfig) -> SharedState {
        let mut config = config;
        config.knowledge.root_url = ROOT.into();
        let fetcher = FixtureFetcher::new().with_page(
            ROOT,
            "<html><head><title>Fees</title></head><body><main>\
             Card machine fees for debit and credit sales are shown in the app settings.\
             </main></body></html>",
        );
        let runtime = AgentRuntime::builder(config)
            .with_provider(Arc::new(MockProvider::new()))
            .with_fetcher(Arc::new(fetcher))
            .build()
            .await;
        Arc::new(GatewayState::new(Arc::new(runtime)))
    }

    fn chat(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn chat_math_round_trip() {
        let app = build_router(test_state(AppConfig::default()).await);
        let response = app
            .oneshot(chat(serde_json::json!({
                "message": "What is (42 * 2) / 6?",
                "user_id": "client_1",
                "conversation_id": "conv-1"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["response"], "14");
        assert_eq!(body["agent_workflow"][0]["agent"], "RouterAgent");
        assert_eq!(body["agent_workflow"][1]["agent"], "MathAgent");
    }

    #[tokio::test]
    async fn empty_message_is_400_with_error_body() {
        let app = build_router(test_state(AppConfig::default()).await);
        let response = app
            .oneshot(chat(serde_json::json!({
                "message": "",
                "user_id": "client_1",
                "conversation_id": "conv-1"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert_eq!(body["error"]["code"], "EMPTY_INPUT");
        assert!(body["request_id"].is_string());
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn malformed_body_is_an_error_body() {
        let app = build_router(test_state(AppConfig::default()).await);
        let response = app
            .oneshot(chat(serde_json::json!({ "text": "hi" })))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        let body = json(response).await;
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut config = AppConfig::default();
        config.gateway.max_body_bytes = 64;
        let app = build_router(test_state(config).await);
        let response = app
            .oneshot(chat(serde_json::json!({
                "message": "x".repeat(500),
                "user_id": "client_1",
                "conversation_id": "conv-1"
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn rate_limit_returns_429() {
        let mut config = AppConfig::default();
        config.gateway.rate_limit_per_minute = 2;
        let app = build_router(test_state(config).await);

        let request = || {
            chat(serde_json::json!({
                "message": "2+2",
                "user_id": "client_1",
                "conversation_id": "conv-1"
            }))
        };
        assert_eq!(app.clone().oneshot(request()).await.unwrap().status(), StatusCode::OK);
        assert_eq!(app.clone().oneshot(request()).await.unwrap().status(), StatusCode::OK);

        let limited = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json(limited).await["error"]["code"], "RATE_LIMITED");

        let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
        assert_eq!(app.oneshot(health).await.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_provider_and_knowledge() {
        let app = build_router(test_state(AppConfig::default()).await);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let health: HealthResponse = serde_json::from_value(json(response).await).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.provider, "mock");
        assert_eq!(health.knowledge, "not_ready");
    }

    #[tokio::test]
    async fn conversations_are_listed_and_fetched() {
        let state = test_state(AppConfig::default()).await;
        let app = build_router(state.clone());

        app.clone()
            .oneshot(chat(serde_json::json!({
                "message": "70 + 12",
                "user_id": "client_1",
                "conversation_id": "conv-42"
            })))
            .await
            .unwrap();

        let list = Request::builder()
            .uri("/users/client_1/conversations?user_id=client_1")
            .body(Body::empty())
            .unwrap();
        let body: ConversationListResponse =
            serde_json::from_value(json(app.clone().oneshot(list).await.unwrap()).await).unwrap();
        assert_eq!(body.conversations.len(), 1);
        assert_eq!(body.conversations[0].conversation_id, "conv-42");
        assert_eq!(body.conversations[0].message_count, 2);

        let get = Request::builder()
            .uri("/conversations/conv-42?user_id=client_1")
            .body(Body::empty())
            .unwrap();
        let body = json(app.clone().oneshot(get).await.unwrap()).await;
        assert_eq!(body["message_history"][1]["content"], "82");
        assert_eq!(body["message_history"][1]["agent_type"], "math");

        let missing = Request::builder()
            .uri("/conversations/nope?user_id=client_1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(missing).await.unwrap().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn conversations_are_private_to_their_owner() {
        let app = build_router(test_state(AppConfig::default()).await);
        app.clone()
            .oneshot(chat(serde_json::json!({
                "message": "70 + 12",
                "user_id": "client_1",
                "conversation_id": "conv-private"
            })))
            .await
            .unwrap();

        let get = |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();

        let foreign = app.clone().oneshot(get("/conversations/conv-private?user_id=client_2")).await.unwrap();
        assert_eq!(foreign.status(), StatusCode::BAD_REQUEST);
        let body = json(foreign).await;
        assert_eq!(body["error"]["code"], "INVALID_CONVERSATION_ID");
        assert!(body.get("message_history").is_none());

        let anonymous = app.clone().oneshot(get("/conversations/conv-private")).await.unwrap();
        assert_eq!(anonymous.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(anonymous).await["error"]["code"], "INVALID_USER_ID");

        let listing = app.oneshot(get("/users/client_1/conversations?user_id=client_2")).await.unwrap();
        assert_eq!(listing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(listing).await["error"]["code"], "INVALID_USER_ID");
    }

    #[tokio::test]
    async fn invalid_user_id_in_path_is_400() {
        let app = build_router(test_state(AppConfig::default()).await);
        let req = Request::builder()
            .uri("/users/bad%20id/conversations")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"]["code"], "INVALID_USER_ID");
    }

    #[tokio::test]
    async fn ingest_then_status_is_ready() {
        let state = test_state(AppConfig::default()).await;
        let app = build_router(state.clone());

        let req = Request::builder()
            .method("POST")
            .uri("/knowledge/ingest")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        assert_eq!(
            state.runtime.knowledge_status().settled().await,
            KnowledgeState::Ready
        );

        let req = Request::builder()
            .uri("/knowledge/status")
            .body(Body::empty())
            .unwrap();
        let body = json(app.oneshot(req).await.unwrap()).await;
        assert_eq!(body["state"], "ready");
        assert_eq!(body["chunks"], 1);
        assert_eq!(body["last_report"]["pages_fetched"], 1);
    }
}
