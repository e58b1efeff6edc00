//! Input security for Switchyard.
//!
//! Provides:
//! - **Security gate**: markup/control-character stripping, whitespace
//!   normalization, length limits and blocked-pattern rejection
//! - **Pattern families**: independently reported regex sets
//! - **Identifier validation**: user and conversation id formats

pub mod gate;
pub mod ids;
pub mod patterns;

pub use gate::SecurityGate;
pub use ids::{validate_conversation_id, validate_user_id};
pub use patterns::{PatternFamily, PatternSet};
