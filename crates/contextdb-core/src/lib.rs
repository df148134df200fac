//! Shared vocabulary for the contextdb workspace: documents, hits,
//! the backend contract, configuration and the error taxonomy.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{Embedder, IndexBackend};
pub use types::{BackendKind, DocId, Document, IdFilter, Metadata, MetadataValue, SearchHit};
