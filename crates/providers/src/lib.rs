//! Language-model provider implementations for Switchyard.
//!
//! All providers implement the `switchyard_core::Provider` trait.
//! [`build_from_config`] picks the backend once at startup.

pub mod fallback;
pub mod mock;
pub mod openai_compat;
pub mod router;

pub use fallback::FallbackProvider;
pub use mock::MockProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, build_router, ProviderMode, ProviderRouter, ProviderSelection};
