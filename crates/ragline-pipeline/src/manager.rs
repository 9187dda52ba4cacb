use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ragline_core::{Document, DocumentStore, Embedder, ErrorKind, Precondition, Result, ResultExt, SearchIndex};
use ragline_vector::VectorIndex;

use crate::query_engine::{QueryEngine, QueryEngineConfig};

/// Owns the current index and its storage directory.
///
/// Exactly one index is current at a time. Creating or loading an index
/// replaces it; the replaced index is not saved implicitly.
pub struct IndexManager<I: SearchIndex = VectorIndex> {
    storage_path: PathBuf,
    index: Option<Arc<I>>,
}

impl<I: SearchIndex + 'static> IndexManager<I> {
    /// Creates the storage directory if it is missing.
    pub fn new(storage_path: impl Into<PathBuf>) -> Result<Self> {
        let storage_path = storage_path.into();
        fs::create_dir_all(&storage_path).wrap_as(ErrorKind::Index, "Failed to create index storage")?;
        tracing::info!(path = %storage_path.display(), "Initialized IndexManager");
        Ok(Self { storage_path, index: None })
    }

    pub fn storage_path(&self) -> &Path { &self.storage_path }

    pub fn current_index(&self) -> Option<Arc<I>> { self.index.clone() }

    /// Builds a new current index from documents that already carry
    /// embeddings. Missing ids are assigned first; `embedder` is kept only for
    /// embedding queries.
    pub fn create_index(&mut self, documents: Vec<Document>, embedder: Arc<dyn Embedder>) -> Result<Arc<I>> {
        tracing::info!("Creating index with {} documents...", documents.len());
        let store = DocumentStore::from_documents(documents);
        let index = Arc::new(I::build(store, embedder).wrap_as(ErrorKind::Index, "Failed to create index")?);
        self.index = Some(Arc::clone(&index));
        tracing::info!("Index created successfully");
        Ok(index)
    }

    pub fn save_index(&self) -> Result<()> {
        let index = self
            .index
            .as_ref()
            .ok_or(Precondition::NoIndexToSave)
            .wrap_as(ErrorKind::Index, "Failed to save index")?;
        index.persist(&self.storage_path).wrap_as(ErrorKind::Index, "Failed to save index")?;
        tracing::info!(
            path = %self.storage_path.display(),
            docs = index.all_documents().len(),
            "Index saved"
        );
        Ok(())
    }

    /// Reloads the saved index, binding it to `embedder` for future queries.
    pub fn load_index(&mut self, embedder: Arc<dyn Embedder>) -> Result<Arc<I>> {
        if !self.storage_path.exists() {
            return Err(Precondition::StorageNotFound(self.storage_path.clone()).into());
        }
        let index = Arc::new(I::reload(&self.storage_path, embedder).wrap_as(ErrorKind::Index, "Failed to load index")?);
        tracing::info!(
            path = %self.storage_path.display(),
            docs = index.all_documents().len(),
            "Index loaded"
        );
        self.index = Some(Arc::clone(&index));
        Ok(index)
    }

    /// A dense query interface over the current index.
    pub fn as_query_engine(&self, config: QueryEngineConfig) -> Result<QueryEngine> {
        let index = self.index.as_ref().ok_or(Precondition::NoIndexLoaded)?;
        Ok(QueryEngine::new(Arc::clone(index) as Arc<dyn SearchIndex>, config))
    }

    /// Runs `query` through the default query engine and returns the
    /// synthesized response.
    pub fn query_index(&self, query: &str) -> Result<String> {
        let engine = self.as_query_engine(QueryEngineConfig::default())?;
        let response = engine.query(query).wrap_as(ErrorKind::Query, "Failed to query index")?;
        Ok(response.to_string())
    }
}
