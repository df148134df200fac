//! LanceDB connection and housekeeping helpers.
use anyhow::{bail, Context, Result};
use arrow_array::{Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::Schema;
use lancedb::{connect, Connection, Table};
use std::sync::Arc;
use tracing::info;

use crate::schema::vector_dim;

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.with_context(|| format!("connecting to LanceDB at {uri}"))
}

/// Open `name`, creating it empty with `schema` when missing.
pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<Table> {
    let names = conn.table_names().execute().await?;
    if names.iter().any(|n| n == name) {
        return Ok(conn.open_table(name).execute().await?);
    }
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
    let table = conn.create_table(name, Box::new(iter)).execute().await.with_context(|| format!("creating table {name}"))?;
    info!(table = name, "created documents table");
    Ok(table)
}

/// Fail when an existing table was built for a different embedding width.
pub async fn check_vector_dim(table: &Table, expected: i32) -> Result<()> {
    let schema = table.schema().await?;
    match vector_dim(&schema) {
        Some(dim) if dim == expected => Ok(()),
        Some(dim) => bail!("table {} stores {dim}-d vectors but the embedder produces {expected}-d", table.name()),
        None => bail!("table {} has no vector column", table.name()),
    }
}

pub(crate) fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .with_context(|| format!("{name} column missing or not utf8"))
}

pub(crate) fn string_value(column: &StringArray, row: usize) -> String {
    if column.is_null(row) { String::new() } else { column.value(row).to_string() }
}
