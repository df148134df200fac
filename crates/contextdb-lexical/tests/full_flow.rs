use std::collections::HashSet;
use std::sync::Arc;

use contextdb_core::traits::IndexBackend;
use contextdb_core::types::{BackendKind, Document, IdFilter, MetadataValue};
use contextdb_lexical::InMemoryIndex;

async fn contract_index() -> InMemoryIndex {
    let index = InMemoryIndex::new();
    index.upsert(Document::new("d1", "Payment due within 30 days")).await.unwrap();
    index.upsert(Document::new("d2", "Governed by the laws of Delaware")).await.unwrap();
    index
}

fn ids(hits: &[contextdb_core::SearchHit]) -> Vec<&str> { hits.iter().map(|h| h.id.as_str()).collect() }

#[tokio::test]
async fn payment_query_drops_unrelated_document() {
    let index = contract_index().await;
    let hits = index.query("payment", 5, None).await.unwrap();
    assert_eq!(ids(&hits), vec!["d1"]);
    assert_eq!(hits[0].score, 1.0);
    assert_eq!(hits[0].source, BackendKind::InMemory);
    assert_eq!(hits[0].text, "Payment due within 30 days");
}

#[tokio::test]
async fn partial_match_scores_half() {
    let index = contract_index().await;
    let hits = index.query("payment terms", 5, None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!((hits[0].score - 0.5).abs() < f32::EPSILON);
}

#[tokio::test]
async fn ties_rank_in_insertion_order() {
    let index = InMemoryIndex::new();
    for id in ["c", "a", "b"] {
        index.upsert(Document::new(id, "termination clause")).await.unwrap();
    }
    index.upsert(Document::new("best", "termination for convenience clause")).await.unwrap();
    let hits = index.query("termination convenience", 10, None).await.unwrap();
    assert_eq!(ids(&hits), vec!["best", "c", "a", "b"]);
}

#[tokio::test]
async fn overwrite_keeps_position_and_replaces_text() {
    let index = InMemoryIndex::new();
    index.upsert(Document::new("first", "indemnity")).await.unwrap();
    index.upsert(Document::new("second", "indemnity")).await.unwrap();
    index.upsert(Document::new("first", "indemnity cap")).await.unwrap();

    assert_eq!(index.len().await, 2, "re-add does not duplicate");
    let hits = index.query("indemnity", 10, None).await.unwrap();
    assert_eq!(ids(&hits), vec!["first", "second"]);
    assert_eq!(hits[0].text, "indemnity cap");
    assert!(index.query("cap", 10, None).await.unwrap().iter().all(|h| h.id == "first"));
}

#[tokio::test]
async fn old_text_is_not_searchable_after_overwrite() {
    let index = InMemoryIndex::new();
    index.upsert(Document::new("d", "arbitration in London")).await.unwrap();
    index.upsert(Document::new("d", "mediation in Paris")).await.unwrap();
    assert!(index.query("london", 5, None).await.unwrap().is_empty());
    assert_eq!(ids(&index.query("paris", 5, None).await.unwrap()), vec!["d"]);
}

#[tokio::test]
async fn filter_restricts_candidates() {
    let index = contract_index().await;
    index.upsert(Document::new("d3", "Late payment interest")).await.unwrap();

    let only_d3: IdFilter = HashSet::from(["d3".to_string(), "unknown".to_string()]);
    let hits = index.query("payment", 5, Some(&only_d3)).await.unwrap();
    assert_eq!(ids(&hits), vec!["d3"]);

    let empty = IdFilter::new();
    assert!(index.query("payment", 5, Some(&empty)).await.unwrap().is_empty());

    assert_eq!(index.query("payment", 5, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn top_k_truncates() {
    let index = InMemoryIndex::new();
    for i in 0..10 {
        index.upsert(Document::new(format!("d{i}"), "confidential information")).await.unwrap();
    }
    let hits = index.query("confidential", 3, None).await.unwrap();
    assert_eq!(ids(&hits), vec!["d0", "d1", "d2"]);
}

#[tokio::test]
async fn empty_index_and_empty_query_return_nothing() {
    let index = InMemoryIndex::new();
    assert!(index.is_empty().await);
    assert!(index.query("anything", 5, None).await.unwrap().is_empty());
    let index = contract_index().await;
    assert!(!index.is_empty().await);
    assert!(index.query("   ", 5, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_missing_id_is_noop() {
    let index = contract_index().await;
    index.delete("nope").await.unwrap();
    assert_eq!(index.count().await.unwrap(), 2);

    index.delete("d1").await.unwrap();
    assert!(!index.contains("d1").await);
    assert!(index.query("payment", 5, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn metadata_round_trips_untouched() {
    let index = InMemoryIndex::new();
    let doc = Document::new("m", "force majeure")
        .with_metadata("page", 3i64)
        .with_metadata("party", "Acme")
        .with_metadata("signed", true)
        .with_metadata("weight", 0.25f64);
    index.upsert(doc.clone()).await.unwrap();
    let hits = index.query("majeure", 1, None).await.unwrap();
    assert_eq!(hits[0].metadata, doc.metadata);
    assert_eq!(hits[0].metadata.get("page"), Some(&MetadataValue::Int(3)));
    assert_eq!(index.get("m").await, Some(doc));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_and_readers() {
    let index = Arc::new(InMemoryIndex::new());
    let mut tasks = Vec::new();
    for w in 0..8 {
        let index = index.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..50 {
                let id = format!("w{w}-{i}");
                index.upsert(Document::new(id.clone(), format!("clause {i} payment schedule"))).await.unwrap();
                let hits = index.query("payment schedule", 5, None).await.unwrap();
                assert!(hits.len() <= 5);
                assert!(hits.iter().all(|h| h.text.ends_with("payment schedule")), "no partial entries");
                if i % 2 == 0 { index.delete(&id).await.unwrap(); }
            }
        }));
    }
    for t in tasks { t.await.unwrap(); }
    assert_eq!(index.len().await, 8 * 25);
}
