use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use tracing::debug;

use contextdb_core::traits::IndexBackend;
use contextdb_core::types::{BackendKind, DocId, Document, IdFilter, Metadata, SearchHit};
use contextdb_core::Result;

use crate::search::{overlap_score, query_tokens};

struct Entry {
    text: String,
    lowered: String,
    metadata: Metadata,
}

/// In-process index used when the persistent backend is unavailable.
///
/// Entries keep their first insertion position, also across overwrites, so
/// equal scores rank in insertion order. Never calls an embedder.
#[derive(Default)]
pub struct InMemoryIndex {
    docs: RwLock<IndexMap<DocId, Entry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self { Self::default() }

    pub async fn len(&self) -> usize { self.docs.read().await.len() }

    pub async fn is_empty(&self) -> bool { self.docs.read().await.is_empty() }

    pub async fn contains(&self, id: &str) -> bool { self.docs.read().await.contains_key(id) }

    pub async fn get(&self, id: &str) -> Option<Document> {
        self.docs.read().await.get(id).map(|e| Document { id: id.to_string(), text: e.text.clone(), metadata: e.metadata.clone() })
    }

    fn entry(doc: Document) -> (DocId, Entry) {
        let lowered = doc.text.to_lowercase();
        (doc.id, Entry { text: doc.text, lowered, metadata: doc.metadata })
    }
}

#[async_trait]
impl IndexBackend for InMemoryIndex {
    fn kind(&self) -> BackendKind { BackendKind::InMemory }

    async fn upsert(&self, doc: Document) -> Result<()> {
        let (id, entry) = Self::entry(doc);
        debug!(doc_id = %id, "in-memory upsert");
        self.docs.write().await.insert(id, entry);
        Ok(())
    }

    async fn upsert_batch(&self, docs: Vec<Document>) -> Result<()> {
        let mut map = self.docs.write().await;
        for doc in docs {
            let (id, entry) = Self::entry(doc);
            map.insert(id, entry);
        }
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize, filter: Option<&IdFilter>) -> Result<Vec<SearchHit>> {
        let tokens = query_tokens(text);
        if tokens.is_empty() || top_k == 0 || filter.is_some_and(IdFilter::is_empty) {
            return Ok(Vec::new());
        }
        let docs = self.docs.read().await;
        let mut hits: Vec<SearchHit> = docs
            .iter()
            .filter(|(id, _)| filter.map_or(true, |f| f.contains(id.as_str())))
            .filter_map(|(id, entry)| {
                let score = overlap_score(&tokens, &entry.lowered);
                (score > 0.0).then(|| SearchHit { id: id.clone(), text: entry.text.clone(), score, metadata: entry.metadata.clone(), source: BackendKind::InMemory })
            })
            .collect();
        drop(docs);
        // stable: equal scores keep insertion order
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let removed = self.docs.write().await.shift_remove(id).is_some();
        debug!(doc_id = %id, removed, "in-memory delete");
        Ok(())
    }

    async fn count(&self) -> Result<usize> { Ok(self.len().await) }
}
