use anyhow::{Context, Result};
use arrow_array::{Array, Float32Array, RecordBatch};
use tracing::warn;

use contextdb_core::types::{BackendKind, IdFilter, Metadata, SearchHit};

use crate::schema::{DISTANCE_COLUMN, ID_COLUMN, METADATA_COLUMN, TEXT_COLUMN};
use crate::table::{string_column, string_value};

/// Map a cosine distance in `[0, 2]` to a similarity in `[0, 1]`.
/// NaN (e.g. from a zero query vector) maps to 0.
pub fn distance_to_similarity(distance: f32) -> f32 {
    (1.0 - distance / 2.0).max(0.0)
}

pub fn quote_sql(value: &str) -> String { format!("'{}'", value.replace('\'', "''")) }

/// `id IN ('a', 'b')`, ids sorted so the predicate is deterministic.
pub fn id_filter_expr(filter: &IdFilter) -> String {
    let mut ids: Vec<&str> = filter.iter().map(String::as_str).collect();
    ids.sort_unstable();
    let quoted: Vec<String> = ids.into_iter().map(quote_sql).collect();
    format!("{ID_COLUMN} IN ({})", quoted.join(", "))
}

pub fn batch_to_hits(batch: &RecordBatch) -> Result<Vec<SearchHit>> {
    let ids = string_column(batch, ID_COLUMN)?;
    let texts = string_column(batch, TEXT_COLUMN)?;
    let metadata = string_column(batch, METADATA_COLUMN)?;
    let distances = batch
        .column_by_name(DISTANCE_COLUMN)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .context("_distance column missing")?;

    let mut hits = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let id = string_value(ids, row);
        let raw = string_value(metadata, row);
        let metadata: Metadata = if raw.is_empty() {
            Metadata::new()
        } else {
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(doc_id = %id, error = %e, "unreadable metadata column");
                Metadata::new()
            })
        };
        let distance = if distances.is_null(row) { f32::NAN } else { distances.value(row) };
        hits.push(SearchHit { text: string_value(texts, row), score: distance_to_similarity(distance), metadata, source: BackendKind::Persistent, id });
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_conversion_clamps_at_zero() {
        assert_eq!(distance_to_similarity(0.0), 1.0);
        assert_eq!(distance_to_similarity(1.0), 0.5);
        assert_eq!(distance_to_similarity(2.0), 0.0);
        assert_eq!(distance_to_similarity(3.0), 0.0);
        assert_eq!(distance_to_similarity(f32::NAN), 0.0);
    }

    #[test]
    fn filter_expression_escapes_quotes() {
        let filter: IdFilter = ["b".to_string(), "o'neil".to_string()].into_iter().collect();
        assert_eq!(id_filter_expr(&filter), "id IN ('b', 'o''neil')");
    }
}
