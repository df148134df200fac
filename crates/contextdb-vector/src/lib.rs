//! Persistent backend: documents and their embeddings in a LanceDB table,
//! searched by cosine nearest neighbour.

pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use contextdb_core::traits::IndexBackend;
use contextdb_core::types::{BackendKind, Document, IdFilter, SearchHit};
use contextdb_core::{Error, Result};
use contextdb_embed::EmbeddingProvider;

use crate::schema::{build_arrow_schema, ID_COLUMN};
use crate::search::{batch_to_hits, id_filter_expr, quote_sql};
use crate::table::{check_vector_dim, ensure_table, open_db};
use crate::writer::{docs_to_record_batch, merge_upsert};

pub struct PersistentIndex {
    _db: Connection,
    table: Table,
    embedder: Arc<EmbeddingProvider>,
    dim: i32,
}

impl PersistentIndex {
    /// Connect to `uri`, creating `table_name` if needed. Fails when the
    /// database is unreachable or the table holds vectors of another width.
    pub async fn open(uri: &str, table_name: &str, embedder: Arc<EmbeddingProvider>) -> AnyResult<Self> {
        let dim = i32::try_from(embedder.dim()).context("embedding dimension too large")?;
        let db = open_db(uri).await?;
        let table = ensure_table(&db, table_name, build_arrow_schema(dim)).await?;
        check_vector_dim(&table, dim).await?;
        info!(uri, table = table_name, dim, model = embedder.model_id(), "persistent index ready");
        Ok(Self { _db: db, table, embedder, dim })
    }

    /// Embeds off the async executor; a panicked worker yields zero vectors.
    async fn embed(&self, texts: Vec<String>) -> Vec<Vec<f32>> {
        let n = texts.len();
        let provider = Arc::clone(&self.embedder);
        match tokio::task::spawn_blocking(move || provider.embed_batch(&texts)).await {
            Ok(vectors) => vectors,
            Err(e) => {
                error!(error = %e, "embedding task failed; using zero vectors");
                vec![self.embedder.zero_vector(); n]
            }
        }
    }

    async fn write(&self, docs: Vec<Document>) -> AnyResult<()> {
        if docs.is_empty() { return Ok(()); }
        let vectors = self.embed(docs.iter().map(|d| d.text.clone()).collect()).await;
        let batch = docs_to_record_batch(&docs, vectors, self.dim)?;
        merge_upsert(&self.table, batch).await
    }

    async fn search(&self, text: &str, top_k: usize, filter: Option<&IdFilter>) -> AnyResult<Vec<SearchHit>> {
        let query_vec = self.embed(vec![text.to_string()]).await.pop().unwrap_or_else(|| self.embedder.zero_vector());
        let mut query = self.table.vector_search(query_vec)?.distance_type(DistanceType::Cosine).limit(top_k);
        if let Some(filter) = filter {
            query = query.only_if(id_filter_expr(filter));
        }
        let mut stream = query.execute().await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            hits.extend(batch_to_hits(&batch)?);
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }
}

fn backend_err(e: &anyhow::Error) -> Error { Error::backend(BackendKind::Persistent, e) }

#[async_trait]
impl IndexBackend for PersistentIndex {
    fn kind(&self) -> BackendKind { BackendKind::Persistent }

    async fn upsert(&self, doc: Document) -> Result<()> {
        let id = doc.id.clone();
        self.write(vec![doc]).await.map_err(|e| backend_err(&e))?;
        debug!(doc_id = %id, "persistent upsert");
        Ok(())
    }

    async fn upsert_batch(&self, docs: Vec<Document>) -> Result<()> {
        // merge_insert rejects repeated keys in one source batch; last write wins
        let mut latest: HashMap<String, usize> = HashMap::new();
        for (i, d) in docs.iter().enumerate() { latest.insert(d.id.clone(), i); }
        let n = docs.len();
        let docs: Vec<Document> = docs.into_iter().enumerate().filter(|(i, d)| latest.get(&d.id) == Some(i)).map(|(_, d)| d).collect();
        self.write(docs).await.map_err(|e| backend_err(&e))?;
        debug!(documents = n, "persistent batch upsert");
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize, filter: Option<&IdFilter>) -> Result<Vec<SearchHit>> {
        if top_k == 0 || filter.is_some_and(IdFilter::is_empty) {
            return Ok(Vec::new());
        }
        self.search(text, top_k, filter).await.map_err(|e| backend_err(&e))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let predicate = format!("{ID_COLUMN} = {}", quote_sql(id));
        self.table.delete(&predicate).await.map_err(|e| backend_err(&e.into()))?;
        debug!(doc_id = %id, "persistent delete");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        self.table.count_rows(None).await.map_err(|e| backend_err(&e.into()))
    }
}
