use contextdb_core::config::Config;
use contextdb_embed::EmbeddingProvider;

fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?.retrieval()?;
    let provider = EmbeddingProvider::from_config(&cfg.embedding);
    let texts = vec!["Payment due within 30 days".to_string(), "Governed by the laws of Delaware".to_string()];
    let embs = provider.embed_batch(&texts);
    println!("model={} B={} dim={} available={}", provider.model_id(), embs.len(), provider.dim(), provider.is_available());
    println!("similarity={:.4}", EmbeddingProvider::similarity(&embs[0], &embs[1]));
    Ok(())
}
