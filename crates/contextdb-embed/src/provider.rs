use tracing::{error, warn};

use contextdb_core::config::EmbeddingConfig;
use contextdb_core::traits::Embedder;
use contextdb_core::Error;

use crate::similarity::cosine_similarity;

/// Text-to-vector mapping that degrades instead of failing.
///
/// Every call returns vectors of `dim()` length. When the model is missing
/// or errors, the affected items come back as zero vectors and the failure
/// is logged at error level. Callers that need to detect this compare
/// against the zero vector.
pub struct EmbeddingProvider {
    model: Option<Box<dyn Embedder>>,
    dim: usize,
    model_id: String,
}

impl EmbeddingProvider {
    pub fn new(model: Box<dyn Embedder>) -> Self {
        let dim = model.dim();
        let model_id = model.model_id().to_string();
        Self { model: Some(model), dim, model_id }
    }

    /// A provider whose model failed to load. Always yields zero vectors.
    pub fn unavailable(dim: usize) -> Self { Self { model: None, dim, model_id: "unavailable".into() } }

    /// Load the configured model, falling back to [`Self::unavailable`].
    pub fn from_config(cfg: &EmbeddingConfig) -> Self {
        match crate::get_default_embedder(cfg) {
            Ok(model) => Self::new(model),
            Err(e) => {
                error!(error = %format!("{e:#}"), dim = cfg.dim, "embedding model unavailable; vectors will be zero");
                Self::unavailable(cfg.dim)
            }
        }
    }

    pub fn dim(&self) -> usize { self.dim }

    pub fn model_id(&self) -> &str { &self.model_id }

    pub fn is_available(&self) -> bool { self.model.is_some() }

    pub fn zero_vector(&self) -> Vec<f32> { vec![0.0; self.dim] }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        self.embed_batch(&[text.to_string()]).pop().unwrap_or_else(|| self.zero_vector())
    }

    /// One vector per input, in input order.
    pub fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() { return Vec::new(); }
        let Some(model) = &self.model else {
            let err = Error::Embedding { model: self.model_id.clone(), message: "model not loaded".into() };
            error!(error = %err, items = texts.len(), "returning zero vectors");
            return vec![self.zero_vector(); texts.len()];
        };
        match model.embed_batch(texts) {
            Ok(vectors) if vectors.len() == texts.len() => vectors.into_iter().enumerate().map(|(i, v)| self.checked(i, v)).collect(),
            Ok(vectors) => {
                warn!(expected = texts.len(), got = vectors.len(), "batch size mismatch; embedding items one by one");
                texts.iter().map(|t| self.embed_single(model.as_ref(), t)).collect()
            }
            Err(e) if texts.len() > 1 => {
                warn!(error = %format!("{e:#}"), "batch embedding failed; embedding items one by one");
                texts.iter().map(|t| self.embed_single(model.as_ref(), t)).collect()
            }
            Err(e) => {
                self.report(&e);
                vec![self.zero_vector()]
            }
        }
    }

    /// Cosine similarity; see [`cosine_similarity`].
    pub fn similarity(a: &[f32], b: &[f32]) -> f32 { cosine_similarity(a, b) }

    fn embed_single(&self, model: &dyn Embedder, text: &str) -> Vec<f32> {
        match model.embed_batch(&[text.to_string()]) {
            Ok(mut vectors) if vectors.len() == 1 => self.checked(0, vectors.remove(0)),
            Ok(vectors) => {
                self.report(&format!("expected 1 vector, got {}", vectors.len()));
                self.zero_vector()
            }
            Err(e) => {
                self.report(&e);
                self.zero_vector()
            }
        }
    }

    fn checked(&self, index: usize, v: Vec<f32>) -> Vec<f32> {
        if v.len() == self.dim && v.iter().all(|x| x.is_finite()) { return v; }
        self.report(&format!("item {index}: got {} dims or non-finite values, expected {}", v.len(), self.dim));
        self.zero_vector()
    }

    fn report(&self, cause: &dyn std::fmt::Display) {
        let err = Error::Embedding { model: self.model_id.clone(), message: format!("{cause:#}") };
        error!(error = %err, "returning zero vector");
    }
}

impl std::fmt::Debug for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingProvider").field("model_id", &self.model_id).field("dim", &self.dim).field("available", &self.is_available()).finish()
    }
}
