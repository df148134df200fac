//! Text embeddings for the persistent backend.
//!
//! `EmbeddingProvider` is the entry point: it never fails, returning zero
//! vectors when the underlying model cannot produce one.

pub mod device;
pub mod hash;
pub mod model;
pub mod pool;
pub mod provider;
pub mod similarity;
pub mod tokenize;

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use contextdb_core::config::{expand_path, EmbeddingConfig};
pub use contextdb_core::traits::Embedder;

pub use hash::HashEmbedder;
pub use model::BertEmbedder;
pub use pool::masked_mean_l2;
pub use provider::EmbeddingProvider;
pub use similarity::cosine_similarity;

pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

pub fn fake_embeddings_requested() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Build the embedder described by `cfg`: the hash embedder when fakes are
/// requested (config or `APP_USE_FAKE_EMBEDDINGS`), otherwise the BERT model.
pub fn get_default_embedder(cfg: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    if cfg.use_fake || fake_embeddings_requested() {
        info!(dim = cfg.dim, "using hash embedder");
        return Ok(Box::new(HashEmbedder::new(cfg.dim)));
    }
    let model_dir = resolve_model_dir(cfg.model_dir.as_deref())?;
    let model = BertEmbedder::load(&model_dir, cfg.max_len)?;
    if model.dim() != cfg.dim {
        return Err(anyhow!("model at {} produces {}-d vectors, config expects {}", model_dir.display(), model.dim(), cfg.dim));
    }
    Ok(Box::new(model))
}

pub fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = expand_path(dir);
        if p.exists() { info!(dir = %p.display(), "using configured model dir"); return Ok(p); }
        return Err(anyhow!("configured model dir {} does not exist", p.display()));
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = expand_path(&dir);
            if p.exists() { info!(dir = %p.display(), var, "using model dir from env"); return Ok(p); }
        }
    }
    let root = Path::new("../models").join(DEFAULT_MODEL_NAME); if root.exists() { info!(dir = %root.display(), "using model dir"); return Ok(root); }
    let local = Path::new("models").join(DEFAULT_MODEL_NAME); if local.exists() { info!(dir = %local.display(), "using model dir"); return Ok(local); }
    Err(anyhow!("Could not locate {DEFAULT_MODEL_NAME} model directory"))
}
