//! Dependency-free fallback backend: an insertion-ordered in-memory map
//! searched by lexical overlap.

pub mod index;
pub mod search;

pub use index::InMemoryIndex;
pub use search::{overlap_score, query_tokens};
