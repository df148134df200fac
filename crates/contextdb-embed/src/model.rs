use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use contextdb_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;

/// Sentence-transformers BERT encoder (MiniLM by default) run with candle.
pub struct BertEmbedder { model: BertModel, tokenizer: Tokenizer, device: Device, dim: usize, max_len: usize, model_id: String }

impl BertEmbedder {
    /// Load `tokenizer.json`, `config.json` and the weights from `model_dir`.
    /// `model.safetensors` is preferred over `pytorch_model.bin`.
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        let started = Instant::now();

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?)
            .with_context(|| format!("parsing {}", config_path.display()))?;

        let safetensors = model_dir.join("model.safetensors");
        let weights: HashMap<String, Tensor> = if safetensors.exists() {
            candle_core::safetensors::load(&safetensors, &device).with_context(|| format!("loading {}", safetensors.display()))?
        } else {
            let bin = model_dir.join("pytorch_model.bin");
            candle_core::pickle::read_all(&bin).with_context(|| format!("loading {}", bin.display()))?.into_iter().collect()
        };
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config).context("building BERT model")?;

        let dim = config.hidden_size;
        let model_id = model_dir.file_name().map_or_else(|| crate::DEFAULT_MODEL_NAME.to_string(), |n| n.to_string_lossy().into_owned());
        info!(model = %model_id, dim, layers = config.num_hidden_layers, elapsed_ms = started.elapsed().as_millis(), "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, max_len: max_len.max(2), model_id })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let mut rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        let v = rows.pop().ok_or_else(|| anyhow!("model returned no rows"))?;
        if v.len() != self.dim { return Err(anyhow!("model returned {} dims, expected {}", v.len(), self.dim)); }
        let elapsed = start.elapsed().as_millis();
        if elapsed > 100 { warn!(elapsed_ms = elapsed, "slow embedding"); } else { debug!(elapsed_ms = elapsed, "embedded"); }
        Ok(v)
    }
}

impl Embedder for BertEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn model_id(&self) -> &str { &self.model_id }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}
