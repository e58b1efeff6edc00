//! The chat pipeline: the heart of Switchyard.
//!
//! Each turn follows the same path:
//!
//! 1. **Validate** user and conversation ids
//! 2. **Sanitize** the message through the security gate
//! 3. **Route** it to the best-scoring specialized agent
//! 4. **Handle** it: math evaluation or retrieval-augmented answering
//! 5. **Persist** the exchange and return the response with its workflow
//!
//! [`AgentRuntime`] wires all of it together from configuration.

pub mod handlers;
pub mod orchestrator;
pub mod router;
pub mod runtime;

pub use handlers::{KnowledgeHandler, MathHandler};
pub use orchestrator::{Orchestrator, TurnOutcome};
pub use router::{AgentScore, Router};
pub use runtime::{AgentRuntime, RuntimeBuilder};
