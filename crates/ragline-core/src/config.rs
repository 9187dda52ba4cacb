use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Loads from the working directory using `RUST_ENV` (default `dev`).
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_in(Path::new("."), &env_name)
    }

    /// Merges `config.toml`, `config.<env>.toml` (both under `base_dir`) and
    /// `APP_*` environment variables, in that order.
    pub fn load_in(base_dir: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(base_dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            other => tracing::debug!(env = other, "no environment-specific config file"),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: base_dir.to_path_buf() };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment, base_dir: &Path) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment), base_dir: base_dir.to_path_buf() }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| RagError::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    pub fn settings(&self) -> Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| RagError::InvalidConfig(e.to_string()))
    }

    /// The index storage directory, expanded and resolved against the config
    /// directory.
    pub fn storage_path(&self) -> Result<PathBuf> {
        Ok(resolve_with_base(&self.base_dir, self.settings()?.storage.path))
    }

    pub fn base_dir(&self) -> &Path { &self.base_dir }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if !self.retrieval.similarity_cutoff.is_finite() {
            return Err(RagError::InvalidConfig("retrieval.similarity_cutoff must be finite".into()));
        }
        if self.embedding.backend == EmbeddingBackend::Hash && self.embedding.dim == 0 {
            return Err(RagError::InvalidConfig("embedding.dim must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.ingest.overlap_percent) {
            return Err(RagError::InvalidConfig("ingest.overlap_percent must be in [0, 1)".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub path: String,
}

impl Default for StorageSettings {
    fn default() -> Self { Self { path: "index_storage".to_string() } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local XLM-RoBERTa weights run through candle.
    Candle,
    /// Deterministic feature hashing, no model files needed.
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub model_name: String,
    pub model_dir: String,
    pub dim: usize,
    pub max_len: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hash,
            model_name: "BAAI/bge-m3".to_string(),
            model_dir: "models/bge-m3".to_string(),
            dim: 384,
            max_len: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalSettings {
    pub similarity_top_k: usize,
    pub similarity_cutoff: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self { Self { similarity_top_k: 2, similarity_cutoff: 0.5 } }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IngestSettings {
    pub chunk: bool,
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for IngestSettings {
    fn default() -> Self { Self { chunk: false, max_tokens: 500, overlap_percent: 0.2 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self { Self { level: "info".to_string() } }
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
