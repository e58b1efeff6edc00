//! Specialized agents behind the [`Handler`](switchyard_core::agent::Handler)
//! trait.
//!
//! - **Math**: extracts an arithmetic expression and has the model evaluate it
//! - **Knowledge**: answers from the indexed help center with cited sources

pub mod knowledge;
pub mod math;

pub use knowledge::KnowledgeHandler;
pub use math::MathHandler;

#[cfg(test)]
pub(crate) mod test_helpers;
