//! Conversation store and vector index implementations for Switchyard.

pub mod conversations;
pub mod file_index;
pub mod index;
pub mod vector;

pub use conversations::InMemoryConversationStore;
pub use file_index::FileVectorIndex;
pub use index::InMemoryVectorIndex;
pub use vector::{cosine_similarity, rank};
