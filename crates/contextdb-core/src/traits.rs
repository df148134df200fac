use async_trait::async_trait;

use crate::error::Result;
use crate::types::{BackendKind, Document, IdFilter, SearchHit};

/// A text-to-vector model. Implementations may fail; the embedding
/// provider turns failures into zero vectors.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn model_id(&self) -> &str;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Storage and search contract shared by the persistent and in-memory
/// backends.
///
/// Errors are reported, never swallowed, at this boundary. Deciding to
/// absorb or degrade belongs to the engine.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Store `doc` under its id, replacing any previous version.
    async fn upsert(&self, doc: Document) -> Result<()>;

    async fn upsert_batch(&self, docs: Vec<Document>) -> Result<()> {
        for doc in docs {
            self.upsert(doc).await?;
        }
        Ok(())
    }

    /// Ranked hits, best first, at most `top_k`. `Some(filter)` restricts
    /// candidates to ids in the set; an empty set matches nothing.
    async fn query(&self, text: &str, top_k: usize, filter: Option<&IdFilter>) -> Result<Vec<SearchHit>>;

    /// Remove `id`. Unknown ids are a no-op.
    async fn delete(&self, id: &str) -> Result<()>;

    async fn count(&self) -> Result<usize>;
}
