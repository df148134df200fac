use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;

use contextdb_core::config::{BackendPreference, RetrievalConfig};
use contextdb_embed::{EmbeddingProvider, HashEmbedder};
use contextdb_engine::{BackendKind, Document, Error, IdFilter, Metadata, MetadataValue, RetrievalEngine};

fn ids(hits: &[contextdb_engine::SearchHit]) -> Vec<&str> { hits.iter().map(|h| h.id.as_str()).collect() }

fn persistent_config(tmp: &TempDir, dim: usize) -> RetrievalConfig {
    let mut cfg = RetrievalConfig::default();
    cfg.backend = BackendPreference::Persistent;
    cfg.lancedb.uri = tmp.path().join("lancedb").to_string_lossy().into_owned();
    cfg.embedding.dim = dim;
    cfg.embedding.use_fake = true;
    cfg
}

async fn contract_engine(engine: &RetrievalEngine) {
    engine.add_document("d1", "Payment due within 30 days", None).await.unwrap();
    engine.add_document("d2", "Governed by the laws of Delaware", None).await.unwrap();
}

#[tokio::test]
async fn fallback_scenario_scores_and_excludes() {
    let engine = RetrievalEngine::in_memory();
    assert_eq!(engine.state(), BackendKind::InMemory);
    contract_engine(&engine).await;

    let hits = engine.search("payment", 5, None).await.unwrap();
    assert_eq!(ids(&hits), vec!["d1"]);
    assert_eq!(hits[0].score, 1.0);

    let hits = engine.search("payment terms", 5, None).await.unwrap();
    assert!((hits[0].score - 0.5).abs() < f32::EPSILON);
}

#[tokio::test]
async fn persistent_scenario_ranks_d1_first() {
    let tmp = TempDir::new().unwrap();
    let engine = RetrievalEngine::new(persistent_config(&tmp, 1024)).await.unwrap();
    assert_eq!(engine.state(), BackendKind::Persistent);
    contract_engine(&engine).await;

    let hits = engine.search("payment", 5, None).await.unwrap();
    assert_eq!(hits[0].id, "d1");
    assert!(hits.iter().all(|h| h.source == BackendKind::Persistent));
    assert_eq!(engine.document_count().await, 2);
}

#[tokio::test]
async fn exact_word_is_found_on_both_backends() {
    let tmp = TempDir::new().unwrap();
    let engines = [RetrievalEngine::in_memory(), RetrievalEngine::new(persistent_config(&tmp, 1024)).await.unwrap()];
    for engine in &engines {
        engine.add_document("nda", "The recipient shall keep all disclosures confidential", None).await.unwrap();
        engine.add_document("lease", "Rent is payable monthly in advance", None).await.unwrap();
        let hits = engine.search("confidential", 5, None).await.unwrap();
        assert!(ids(&hits).contains(&"nda"), "{:?} missed the exact word", engine.state());
    }
}

#[tokio::test]
async fn unusable_persistent_store_falls_back_at_construction() {
    let tmp = TempDir::new().unwrap();
    let cfg = persistent_config(&tmp, 8);
    // an 8-d table makes a 16-d embedder unusable
    RetrievalEngine::new(cfg.clone()).await.unwrap();
    let mut cfg16 = cfg;
    cfg16.embedding.dim = 16;
    let engine = RetrievalEngine::new(cfg16).await.unwrap();
    assert_eq!(engine.state(), BackendKind::InMemory);

    contract_engine(&engine).await;
    assert_eq!(ids(&engine.search("payment", 5, None).await.unwrap()), vec!["d1"]);
}

#[tokio::test]
async fn persistent_path_blocked_by_a_file_falls_back() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();
    let mut cfg = persistent_config(&tmp, 32);
    cfg.lancedb.uri = blocker.join("lancedb").to_string_lossy().into_owned();

    let engine = RetrievalEngine::new(cfg).await.unwrap();
    assert_eq!(engine.state(), BackendKind::InMemory);
}

#[tokio::test]
async fn injected_embedder_is_used() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = persistent_config(&tmp, 64);
    cfg.embedding.use_fake = false;
    let provider = Arc::new(EmbeddingProvider::new(Box::new(HashEmbedder::new(64))));
    let engine = RetrievalEngine::with_embedder(cfg, provider).await.unwrap();
    assert_eq!(engine.state(), BackendKind::Persistent);
}

#[tokio::test]
async fn configured_in_memory_skips_persistent_backend() {
    let engine = RetrievalEngine::new(RetrievalConfig::in_memory()).await.unwrap();
    assert_eq!(engine.state(), BackendKind::InMemory);
    assert_eq!(engine.default_top_k(), 5);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let mut cfg = RetrievalConfig::in_memory();
    cfg.search.default_top_k = 0;
    assert!(matches!(RetrievalEngine::new(cfg).await, Err(Error::InvalidConfig(_))));
}

#[tokio::test]
async fn caller_mistakes_are_rejected() {
    let engine = RetrievalEngine::in_memory();
    contract_engine(&engine).await;

    let err = engine.search("payment", 0, None).await.unwrap_err();
    assert!(err.is_invalid_argument());

    let bad: IdFilter = HashSet::from([String::new(), "d1".to_string()]);
    assert!(engine.search("payment", 5, Some(&bad)).await.unwrap_err().is_invalid_argument());

    assert!(engine.add_document("", "text", None).await.unwrap_err().is_invalid_argument());
    assert!(engine.delete_document("").await.unwrap_err().is_invalid_argument());
    assert!(engine.add_documents(vec![Document::new("", "x")]).await.unwrap_err().is_invalid_argument());
}

#[tokio::test]
async fn filters_apply_as_sets() {
    let engine = RetrievalEngine::in_memory();
    contract_engine(&engine).await;
    engine.add_document("d3", "Payment by wire transfer", None).await.unwrap();

    let filter: IdFilter = HashSet::from(["d3".to_string(), "not-indexed".to_string()]);
    assert_eq!(ids(&engine.search("payment", 5, Some(&filter)).await.unwrap()), vec!["d3"]);
    assert!(engine.search("payment", 5, Some(&IdFilter::new())).await.unwrap().is_empty());
    assert_eq!(engine.search("payment", 5, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn empty_engine_returns_empty_list() {
    let engine = RetrievalEngine::in_memory();
    assert!(engine.search("anything at all", 5, None).await.unwrap().is_empty());
    assert_eq!(engine.document_count().await, 0);
}

#[tokio::test]
async fn overwrite_and_delete() {
    let engine = RetrievalEngine::in_memory();
    engine.add_document("d", "auto renewal clause", None).await.unwrap();
    engine.add_document("d", "termination clause", None).await.unwrap();
    assert!(engine.search("renewal", 5, None).await.unwrap().is_empty());
    assert_eq!(engine.document_count().await, 1);

    engine.delete_document("ghost").await.unwrap();
    assert_eq!(engine.document_count().await, 1);
    engine.delete_document("d").await.unwrap();
    assert!(engine.search("termination", 5, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn metadata_is_passed_through() {
    let engine = RetrievalEngine::in_memory();
    let mut meta = Metadata::new();
    meta.insert("contract_id".into(), MetadataValue::from("C-42"));
    meta.insert("page".into(), MetadataValue::Int(7));
    engine.add_document("c42:0", "Warranty disclaimer", Some(meta.clone())).await.unwrap();
    let hits = engine.search("warranty", 1, None).await.unwrap();
    assert_eq!(hits[0].metadata, meta);
}

#[tokio::test]
async fn retrieve_context_formats_hits_with_citations() {
    let engine = RetrievalEngine::in_memory();
    contract_engine(&engine).await;
    let ctx = engine.retrieve_context("payment", 5, None).await.unwrap();
    assert_eq!(ctx.text, "[Document d1]:\nPayment due within 30 days");
    assert_eq!(ctx.citations.len(), 1);
    assert_eq!(ctx.citations[0].end_char, "Payment due within 30 days".len());

    let none = engine.retrieve_context("indemnification", 5, None).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_engine_survives_concurrent_use() {
    let engine = Arc::new(RetrievalEngine::in_memory());
    let mut tasks = Vec::new();
    for t in 0..8 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            let shared = format!("shared-{}", t % 2);
            for i in 0..25 {
                engine.add_document(&shared, &format!("governing law version {i}"), None).await.unwrap();
                let own = format!("t{t}-{i}");
                engine.add_document(&own, "governing law of New York", None).await.unwrap();
                let hits = engine.search("governing law", 3, None).await.unwrap();
                assert!(hits.len() <= 3);
                engine.delete_document(&own).await.unwrap();
            }
        }));
    }
    for t in tasks { t.await.unwrap(); }
    assert_eq!(engine.document_count().await, 2, "only the two shared ids remain");
}

/// Replace the LanceDB directory with a plain file so every later read or
/// write through the open table fails.
fn break_store(tmp: &TempDir) {
    let dir = tmp.path().join("lancedb");
    std::fs::remove_dir_all(&dir).unwrap();
    std::fs::write(&dir, b"gone").unwrap();
}

#[tokio::test]
async fn repeated_persistent_failures_switch_to_in_memory() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = persistent_config(&tmp, 64);
    cfg.degrade_after_failures = 2;
    let engine = RetrievalEngine::new(cfg).await.unwrap();
    assert_eq!(engine.state(), BackendKind::Persistent);
    contract_engine(&engine).await;
    break_store(&tmp);

    assert!(engine.search("payment", 5, None).await.unwrap().is_empty());
    assert_eq!(engine.state(), BackendKind::Persistent, "one failure is below the threshold");
    assert!(engine.search("payment", 5, None).await.unwrap().is_empty());
    assert_eq!(engine.state(), BackendKind::InMemory);

    // the new index starts empty; documents are re-added by the caller
    assert_eq!(engine.document_count().await, 0);
    contract_engine(&engine).await;
    let hits = engine.search("payment", 5, None).await.unwrap();
    assert_eq!(ids(&hits), vec!["d1"]);
    assert_eq!(hits[0].source, BackendKind::InMemory);
}

#[tokio::test]
async fn zero_threshold_keeps_failing_persistent_backend() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = persistent_config(&tmp, 64);
    cfg.degrade_after_failures = 0;
    let engine = RetrievalEngine::new(cfg).await.unwrap();
    contract_engine(&engine).await;
    break_store(&tmp);

    for _ in 0..5 {
        assert!(engine.search("payment", 5, None).await.unwrap().is_empty());
    }
    engine.add_document("d3", "Payment by wire transfer", None).await.unwrap();
    engine.delete_document("d1").await.unwrap();
    assert_eq!(engine.state(), BackendKind::Persistent);
}
