use std::path::Path;
use std::sync::Arc;

use crate::store::DocumentStore;
use crate::types::{Document, ScoredDocument, SearchHit};

/// Text to vector capability.
///
/// Implementations must be deterministic for identical input and must return
/// vectors of length [`Embedder::dim`].
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `hash:xxh64:d384`).
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_text(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}

pub trait TextIndexer: Send + Sync {
    fn index(&self, documents: &[Document]) -> anyhow::Result<()>;
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// The operations the pipeline needs from a vector storage engine.
///
/// Results of both searches are ordered by descending score.
pub trait SearchIndex: Send + Sync {
    /// Builds an index over documents that already carry ids and embeddings.
    /// `embedder` is kept for query-time embedding only.
    fn build(documents: DocumentStore, embedder: Arc<dyn Embedder>) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Reconstructs an index previously written by [`SearchIndex::persist`].
    fn reload(dir: &Path, embedder: Arc<dyn Embedder>) -> anyhow::Result<Self>
    where
        Self: Sized;

    fn persist(&self, dir: &Path) -> anyhow::Result<()>;

    fn search_by_vector(&self, query: &[f32], k: usize) -> anyhow::Result<Vec<ScoredDocument>>;

    fn search_by_keyword(&self, query: &str, k: usize) -> anyhow::Result<Vec<ScoredDocument>>;

    fn all_documents(&self) -> &[Document];

    fn embedder(&self) -> &Arc<dyn Embedder>;
}
