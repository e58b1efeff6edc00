//! # Switchyard Core
//!
//! Domain types, traits, and error definitions for the Switchyard multi-agent
//! chat service. This crate has **zero framework dependencies**: it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here: language models
//! ([`Provider`]), conversation persistence ([`ConversationStore`]), the
//! vector index ([`VectorIndex`]) and page fetching ([`PageFetcher`]).
//! Implementations live in their respective crates, so tests can swap in
//! deterministic doubles.

pub mod error;
pub mod message;
pub mod agent;
pub mod provider;
pub mod store;
pub mod index;
pub mod fetch;
pub mod chat;

// Re-export key types at crate root for ergonomics
pub use error::{
    EmbeddingError, Error, IndexError, MathError, ProviderError, Result, ScrapeError, StoreError,
    ValidationCode, ValidationError,
};
pub use message::{ConversationContext, Message, Sender};
pub use agent::{AgentDecision, AgentKind, AgentResponse, Handler};
pub use provider::{
    EmbeddingRequest, EmbeddingResponse, PromptMessage, Provider, ProviderRequest,
    ProviderResponse, Role, Usage,
};
pub use store::ConversationStore;
pub use index::{Chunk, ChunkMetadata, IndexEntry, ScoredChunk, VectorIndex};
pub use fetch::{FetchedPage, PageFetcher};
pub use chat::{ChatRequest, ChatResponse, ErrorBody, ErrorDetail, WorkflowStep};
