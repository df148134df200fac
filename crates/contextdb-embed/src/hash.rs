use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use contextdb_core::traits::Embedder;

/// Deterministic bag-of-tokens embedder for tests and offline runs.
///
/// Tokens are lowercased and stripped of surrounding punctuation, hashed
/// into `dim` buckets, and the result is L2-normalized. Texts sharing words
/// get a positive cosine similarity; empty text maps to the zero vector.
pub struct HashEmbedder { dim: usize, model_id: String }

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, model_id: format!("hash-{dim}") } }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        if self.dim == 0 { return v; }
        let tokens = text.split_whitespace().map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()).filter(|t| !t.is_empty());
        for (i, token) in tokens.enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += 0.5 + val + (i % 3) as f32 * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn model_id(&self) -> &str { &self.model_id }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
