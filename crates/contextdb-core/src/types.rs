//! Domain types shared by every backend.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

pub type DocId = String;
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Restriction of a search to a set of document ids.
pub type IdFilter = HashSet<DocId>;

/// Scalar metadata value. Opaque to the engine and returned unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self { Self::Text(v.to_string()) }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self { Self::Text(v) }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self { Self::Int(v) }
}

impl From<usize> for MetadataValue {
    fn from(v: usize) -> Self { Self::Int(i64::try_from(v).unwrap_or(i64::MAX)) }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self { Self::Float(v) }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self { Self::Bool(v) }
}

/// A unit of retrievable text.
///
/// - `id`: caller-assigned, unique within an engine; re-adding replaces
/// - `text`: indexed as a single unit (pre-chunk under distinct ids if needed)
/// - `metadata`: pass-through payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<DocId>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: Metadata::new() }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Which backend is serving requests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Persistent,
    InMemory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persistent => f.write_str("persistent"),
            Self::InMemory => f.write_str("in-memory"),
        }
    }
}

/// One ranked search result.
///
/// `score` is backend-specific but higher is always better; compare scores
/// only within a single search call. `source` labels the backend that
/// produced the hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: DocId,
    pub text: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Metadata,
    pub source: BackendKind,
}
