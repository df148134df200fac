//! Single entry point for retrieval. Hides which backend is serving and
//! turns environmental failures into empty results.

pub mod backend;
pub mod context;
pub mod engine;

pub use backend::{Backend, FailureTracker};
pub use context::{assemble_context, Citation, RetrievedContext};
pub use engine::RetrievalEngine;

pub use contextdb_core::config::RetrievalConfig;
pub use contextdb_core::types::{BackendKind, Document, IdFilter, Metadata, MetadataValue, SearchHit};
pub use contextdb_core::{Error, Result};
