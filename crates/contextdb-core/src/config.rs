//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` +
//! `config.<env>.toml` + `APP_*` env vars (`__` separates nested keys, so
//! `APP_RETRIEVAL__BACKEND=in_memory` sets `retrieval.backend`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub const RETRIEVAL_KEY: &str = "retrieval";

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self::from_figment(figment).for_env(env_name);
        config.validate_for_env()?;
        Ok(config)
    }

    /// Wrap an already-assembled figment, layering it over the defaults.
    pub fn from_figment(figment: Figment) -> Self {
        let figment = Figment::from(Serialized::default(RETRIEVAL_KEY, RetrievalConfig::default())).merge(figment);
        Self { figment, env_name: "dev".to_string() }
    }

    #[must_use]
    pub fn for_env(mut self, env_name: impl Into<String>) -> Self {
        self.env_name = env_name.into();
        self
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The typed `[retrieval]` section, validated.
    pub fn retrieval(&self) -> anyhow::Result<RetrievalConfig> {
        let cfg: RetrievalConfig = self.get(RETRIEVAL_KEY)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate_for_env(&self) -> anyhow::Result<()> {
        let cfg = self.retrieval()?;
        match self.env_name.as_str() {
            "prod" | "production" if cfg.embedding.use_fake => {
                Err(Error::InvalidConfig("fake embeddings are not allowed in production".into()).into())
            }
            _ => Ok(()),
        }
    }
}

/// Which backend the engine should try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    #[default]
    Persistent,
    InMemory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanceConfig {
    pub uri: String,
    pub table: String,
}

impl Default for LanceConfig {
    fn default() -> Self { Self { uri: "data/lancedb".into(), table: "documents".into() } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model_dir: Option<String>,
    pub dim: usize,
    pub max_len: usize,
    pub use_fake: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self { Self { model_dir: None, dim: 384, max_len: 256, use_fake: false } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_top_k: usize,
    /// Upper bound on assembled context length; 0 means unlimited.
    pub max_context_chars: usize,
    pub preview_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self { Self { default_top_k: 5, max_context_chars: 0, preview_chars: 200 } }
}

/// Settings for one retrieval engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub backend: BackendPreference,
    /// Consecutive persistent failures before falling back for good. 0 disables.
    pub degrade_after_failures: u32,
    pub lancedb: LanceConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::default(),
            degrade_after_failures: 3,
            lancedb: LanceConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl RetrievalConfig {
    /// Fallback-only settings, handy for tests and single-process tools.
    pub fn in_memory() -> Self { Self { backend: BackendPreference::InMemory, ..Self::default() } }

    pub fn validate(&self) -> crate::Result<()> {
        let fail = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));
        if self.embedding.dim == 0 { return fail("embedding.dim must be positive"); }
        if self.embedding.max_len == 0 { return fail("embedding.max_len must be positive"); }
        if self.search.default_top_k == 0 { return fail("search.default_top_k must be positive"); }
        if self.lancedb.uri.trim().is_empty() { return fail("lancedb.uri must not be empty"); }
        if self.lancedb.table.trim().is_empty() { return fail("lancedb.table must not be empty"); }
        Ok(())
    }

    /// LanceDB location with `~` and env vars expanded.
    pub fn lancedb_uri(&self) -> String {
        if self.lancedb.uri.contains("://") {
            return self.lancedb.uri.clone();
        }
        expand_path(&self.lancedb.uri).to_string_lossy().into_owned()
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
