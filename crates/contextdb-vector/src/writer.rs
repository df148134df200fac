use anyhow::{ensure, Result};
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use lancedb::Table;
use std::sync::Arc;

use contextdb_core::types::Document;

use crate::schema::{build_arrow_schema, ID_COLUMN};

/// One row per document; `vectors[i]` belongs to `docs[i]`.
pub fn docs_to_record_batch(docs: &[Document], vectors: Vec<Vec<f32>>, dim: i32) -> Result<RecordBatch> {
    ensure!(docs.len() == vectors.len(), "{} documents but {} vectors", docs.len(), vectors.len());
    let width = usize::try_from(dim)?;
    ensure!(vectors.iter().all(|v| v.len() == width), "vector width differs from {dim}");

    let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
    let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
    let metadata = docs.iter().map(|d| serde_json::to_string(&d.metadata)).collect::<Result<Vec<_>, _>>()?;
    let now = Utc::now().timestamp_millis();
    let vectors = vectors.into_iter().map(|v| Some(v.into_iter().map(Some).collect::<Vec<_>>()));

    Ok(RecordBatch::try_new(build_arrow_schema(dim), vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(StringArray::from(texts)),
        Arc::new(StringArray::from(metadata)),
        Arc::new(TimestampMillisecondArray::from(vec![now; docs.len()])),
        Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
    ])?)
}

/// Insert-or-replace keyed on `id`, so a re-added document never duplicates.
pub async fn merge_upsert(table: &Table, batch: RecordBatch) -> Result<()> {
    let schema = batch.schema();
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    let mut mi = table.merge_insert(&[ID_COLUMN]);
    mi.when_matched_update_all(None).when_not_matched_insert_all();
    let _ = mi.execute(reader).await?;
    Ok(())
}
