use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, info, warn};

use contextdb_core::config::{BackendPreference, RetrievalConfig};
use contextdb_core::types::{BackendKind, Document, IdFilter, Metadata, SearchHit};
use contextdb_core::{Error, Result};
use contextdb_embed::EmbeddingProvider;
use contextdb_lexical::InMemoryIndex;
use contextdb_vector::PersistentIndex;

use crate::backend::{Backend, FailureTracker};
use crate::context::{assemble_context, RetrievedContext};

/// Document retrieval over whichever backend is available.
///
/// Construct once and share behind an `Arc`. The engine starts on the
/// persistent backend when it can and moves to the in-memory backend for
/// good when it cannot: at construction, or after
/// `degrade_after_failures` consecutive persistent failures.
///
/// Only caller mistakes come back as errors. Backend failures are logged;
/// writes become no-ops and searches return no hits.
///
/// The in-memory index taken over at a runtime switch starts empty. A write
/// already in flight at that moment may still land in the persistent store
/// and never reach the new index, so callers re-add the documents they need
/// before each search.
pub struct RetrievalEngine {
    active: RwLock<Arc<Backend>>,
    failures: FailureTracker,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    /// Build from configuration, loading the embedding model when the
    /// persistent backend is preferred.
    pub async fn new(config: RetrievalConfig) -> Result<Self> {
        config.validate()?;
        if config.backend == BackendPreference::InMemory {
            return Ok(Self::with_backend(config, Backend::InMemory(InMemoryIndex::new())));
        }
        let embedding_cfg = config.embedding.clone();
        let embedder = match tokio::task::spawn_blocking(move || EmbeddingProvider::from_config(&embedding_cfg)).await {
            Ok(provider) => provider,
            Err(e) => {
                error!(error = %e, "embedding model loader panicked");
                EmbeddingProvider::unavailable(config.embedding.dim)
            }
        };
        Self::with_embedder(config, Arc::new(embedder)).await
    }

    /// Build with a caller-supplied embedding provider.
    pub async fn with_embedder(config: RetrievalConfig, embedder: Arc<EmbeddingProvider>) -> Result<Self> {
        config.validate()?;
        let backend = match config.backend {
            BackendPreference::InMemory => {
                info!("in-memory backend selected by configuration");
                Backend::InMemory(InMemoryIndex::new())
            }
            BackendPreference::Persistent => {
                let uri = config.lancedb_uri();
                match PersistentIndex::open(&uri, &config.lancedb.table, embedder).await {
                    Ok(index) => Backend::Persistent(index),
                    Err(e) => {
                        warn!(uri = %uri, error = %format!("{e:#}"), "persistent backend unavailable; falling back to in-memory index");
                        Backend::InMemory(InMemoryIndex::new())
                    }
                }
            }
        };
        Ok(Self::with_backend(config, backend))
    }

    /// Fallback-only engine with default settings.
    pub fn in_memory() -> Self {
        Self::with_backend(RetrievalConfig::in_memory(), Backend::InMemory(InMemoryIndex::new()))
    }

    fn with_backend(config: RetrievalConfig, backend: Backend) -> Self {
        info!(backend = %backend.kind(), "retrieval engine ready");
        Self { active: RwLock::new(Arc::new(backend)), failures: FailureTracker::new(config.degrade_after_failures), config }
    }

    pub fn state(&self) -> BackendKind { self.active().kind() }

    pub fn default_top_k(&self) -> usize { self.config.search.default_top_k }

    fn active(&self) -> Arc<Backend> {
        Arc::clone(&self.active.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Switch to a fresh in-memory index. One-way; later calls do nothing.
    fn degrade(&self, reason: &Error) {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if active.kind() == BackendKind::InMemory { return; }
        warn!(error = %reason, failures = self.failures.consecutive(), "persistent backend keeps failing; switching to in-memory index for the rest of the process");
        *active = Arc::new(Backend::InMemory(InMemoryIndex::new()));
    }

    fn record<T>(&self, backend: &Backend, outcome: &Result<T>) {
        if backend.kind() != BackendKind::Persistent { return; }
        match outcome {
            Ok(_) => self.failures.record_success(),
            Err(e) => {
                if self.failures.record_failure() { self.degrade(e); }
            }
        }
    }

    /// Index `text` under `id`, replacing any earlier version. Call it
    /// before every search that needs the document; it is idempotent.
    pub async fn add_document(&self, id: &str, text: &str, metadata: Option<Metadata>) -> Result<()> {
        validate_id(id)?;
        let doc = Document { id: id.to_string(), text: text.to_string(), metadata: metadata.unwrap_or_default() };
        let backend = self.active();
        let outcome = backend.index().upsert(doc).await;
        self.record(&backend, &outcome);
        if let Err(e) = outcome {
            error!(doc_id = %id, error = %e, "indexing failed; document skipped");
        }
        Ok(())
    }

    pub async fn add_documents(&self, docs: Vec<Document>) -> Result<()> {
        for doc in &docs { validate_id(&doc.id)?; }
        if docs.is_empty() { return Ok(()); }
        let n = docs.len();
        let backend = self.active();
        let outcome = backend.index().upsert_batch(docs).await;
        self.record(&backend, &outcome);
        if let Err(e) = outcome {
            error!(documents = n, error = %e, "batch indexing failed; documents skipped");
        }
        Ok(())
    }

    /// Ranked hits for `query`, best first, at most `top_k`.
    ///
    /// `filter: None` searches everything; `Some(ids)` only those ids, and an
    /// empty set yields nothing. Errors only for `top_k == 0` or an empty id
    /// in the filter.
    pub async fn search(&self, query: &str, top_k: usize, filter: Option<&IdFilter>) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(Error::invalid_argument("top_k must be at least 1"));
        }
        if let Some(ids) = filter {
            if ids.iter().any(|id| id.is_empty()) {
                return Err(Error::invalid_argument("filter contains an empty document id"));
            }
            if ids.is_empty() { return Ok(Vec::new()); }
        }

        let backend = self.active();
        let outcome = backend.index().query(query, top_k, filter).await;
        self.record(&backend, &outcome);
        match outcome {
            Ok(mut hits) => {
                if let Some(ids) = filter { hits.retain(|h| ids.contains(&h.id)); }
                hits.truncate(top_k);
                debug!(backend = %backend.kind(), top_k, hits = hits.len(), "search");
                Ok(hits)
            }
            Err(e) => {
                error!(backend = %backend.kind(), error = %e, "search failed; returning no results");
                Ok(Vec::new())
            }
        }
    }

    /// Remove `id`. Unknown ids are fine.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        let backend = self.active();
        let outcome = backend.index().delete(id).await;
        self.record(&backend, &outcome);
        if let Err(e) = outcome {
            error!(doc_id = %id, error = %e, "delete failed");
        }
        Ok(())
    }

    /// Documents held by the active backend; 0 when it cannot tell.
    pub async fn document_count(&self) -> usize {
        let backend = self.active();
        let outcome = backend.index().count().await;
        self.record(&backend, &outcome);
        outcome.unwrap_or_else(|e| {
            error!(error = %e, "count failed");
            0
        })
    }

    /// Search and format the hits as model context with citations.
    pub async fn retrieve_context(&self, question: &str, top_k: usize, filter: Option<&IdFilter>) -> Result<RetrievedContext> {
        let hits = self.search(question, top_k, filter).await?;
        Ok(assemble_context(hits, self.config.search.max_context_chars, self.config.search.preview_chars))
    }
}

fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() { return Err(Error::invalid_argument("document id must not be empty")); }
    Ok(())
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine").field("state", &self.state()).field("failures", &self.failures).finish_non_exhaustive()
    }
}
