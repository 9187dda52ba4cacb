//! ragline-embed
//!
//! Embedding backends and the [`EmbeddingService`] that loads one of them once
//! and hands the shared handle to the index layer. Nothing here is global: the
//! handle returned by [`EmbeddingService::load_model`] must be passed on
//! explicitly.

use std::path::PathBuf;
use std::sync::Arc;

use ragline_core::config::{expand_path, resolve_with_base, Config, EmbeddingBackend, EmbeddingSettings};
use ragline_core::text::truncate;
use ragline_core::{Embedder, ErrorKind, Precondition, Result, ResultExt};

pub mod device;
pub mod hash;
pub mod model;
pub mod pool;
pub mod tokenize;

pub use hash::HashEmbedder;
pub use model::CandleEmbedder;
pub use pool::masked_mean_l2;

/// Shared, cheaply clonable reference to a loaded embedding model.
pub type ModelHandle = Arc<dyn Embedder>;

pub struct EmbeddingService {
    settings: EmbeddingSettings,
    model_dir: PathBuf,
    model: Option<ModelHandle>,
}

impl EmbeddingService {
    pub fn new(settings: EmbeddingSettings) -> Self {
        let model_dir = expand_path(&settings.model_dir);
        tracing::info!(model = %settings.model_name, backend = ?settings.backend, "initialized embedding service");
        Self { settings, model_dir, model: None }
    }

    /// Resolves the model directory against the config directory.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = config.settings()?.embedding;
        let model_dir = resolve_with_base(config.base_dir(), &settings.model_dir);
        let mut service = Self::new(settings);
        service.model_dir = model_dir;
        Ok(service)
    }

    /// A service whose model is already loaded.
    pub fn with_model(model: ModelHandle) -> Self {
        let settings = EmbeddingSettings { model_name: model.model_id().to_string(), dim: model.dim(), ..EmbeddingSettings::default() };
        Self { settings, model_dir: PathBuf::new(), model: Some(model) }
    }

    pub fn model_name(&self) -> &str { &self.settings.model_name }

    pub fn model(&self) -> Option<&ModelHandle> { self.model.as_ref() }

    /// Loads the configured model, or returns the cached handle.
    pub fn load_model(&mut self) -> Result<ModelHandle> {
        if let Some(model) = &self.model {
            tracing::info!(model = %self.settings.model_name, "Using existing embedding model");
            return Ok(Arc::clone(model));
        }
        tracing::info!(model = %self.settings.model_name, "Loading embedding model");
        let model: ModelHandle = match self.settings.backend {
            EmbeddingBackend::Hash => Arc::new(
                HashEmbedder::try_new(self.settings.dim).wrap_as(ErrorKind::Embedding, "Failed to load embedding model")?,
            ),
            EmbeddingBackend::Candle => Arc::new(
                CandleEmbedder::load(&self.model_dir, &self.settings.model_name, self.settings.max_len)
                    .wrap_as(ErrorKind::Embedding, "Failed to load embedding model")?,
            ),
        };
        tracing::info!(model_id = model.model_id(), dim = model.dim(), "Embedding model loaded successfully");
        self.model = Some(Arc::clone(&model));
        Ok(model)
    }

    fn loaded(&self) -> Result<&ModelHandle> {
        self.model
            .as_ref()
            .ok_or(Precondition::ModelNotLoaded)
            .wrap_as(ErrorKind::Embedding, "Failed to generate embedding")
    }

    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.loaded()?
            .embed_text(text)
            .wrap_as(ErrorKind::Embedding, "Failed to generate embedding")
    }

    /// Embeds each text in order. A failing item yields `None` and is logged;
    /// the remaining items are still processed.
    pub fn embed_many(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        let model = self.loaded()?;
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            match model.embed_text(text) {
                Ok(v) => embeddings.push(Some(v)),
                Err(e) => {
                    tracing::warn!("Error generating embedding for text: {}...: {e:#}", truncate(text, 50));
                    embeddings.push(None);
                }
            }
        }
        Ok(embeddings)
    }
}
