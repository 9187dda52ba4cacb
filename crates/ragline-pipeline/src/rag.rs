//! Retrieval over a bound index.
//!
//! Two strategies with deliberately different filtering:
//!
//! - dense: cosine candidates from the query engine, then a strict
//!   `score > similarity_cutoff` check. Unscored candidates are dropped.
//! - sparse: BM25 over the index's documents, at most `similarity_top_k`
//!   results, never thresholded.
//!
//! Neither strategy falls back to the other; see
//! [`crate::QueryProcessor::process_query_with_fallback`] for that.

use std::sync::Arc;

use ragline_core::config::RetrievalSettings;
use ragline_core::text::truncate;
use ragline_core::{ErrorKind, Precondition, Result, ResultExt, SearchIndex};

use crate::manager::IndexManager;
use crate::query_engine::{QueryEngine, QueryEngineConfig, ResponseMode};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    pub similarity_top_k: usize,
    pub similarity_cutoff: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self { Self { similarity_top_k: 2, similarity_cutoff: 0.5 } }
}

impl From<RetrievalSettings> for RetrievalConfig {
    fn from(s: RetrievalSettings) -> Self {
        Self { similarity_top_k: s.similarity_top_k, similarity_cutoff: s.similarity_cutoff }
    }
}

#[derive(Default)]
pub struct RagPipeline {
    config: RetrievalConfig,
    index: Option<Arc<dyn SearchIndex>>,
    query_engine: Option<QueryEngine>,
}

impl RagPipeline {
    pub fn new(config: RetrievalConfig) -> Self {
        tracing::info!(top_k = config.similarity_top_k, cutoff = config.similarity_cutoff, "Created new RAG pipeline");
        Self { config, index: None, query_engine: None }
    }

    pub fn config(&self) -> &RetrievalConfig { &self.config }

    pub fn is_initialized(&self) -> bool { self.query_engine.is_some() }

    /// Binds the pipeline to `index`, replacing any earlier binding.
    pub fn initialize(&mut self, index: Option<Arc<dyn SearchIndex>>) -> Result<()> {
        let index = index.ok_or(Precondition::MissingIndex)?;
        let engine_config = QueryEngineConfig {
            similarity_top_k: self.config.similarity_top_k,
            similarity_cutoff: Some(self.config.similarity_cutoff),
            response_mode: ResponseMode::NoText,
        };
        self.query_engine = Some(QueryEngine::new(Arc::clone(&index), engine_config));
        self.index = Some(index);
        tracing::info!(
            top_k = self.config.similarity_top_k,
            cutoff = self.config.similarity_cutoff,
            "Pipeline initialized"
        );
        Ok(())
    }

    /// Binds to the manager's current index.
    pub fn initialize_from<I: SearchIndex + 'static>(&mut self, manager: &IndexManager<I>) -> Result<()> {
        self.initialize(manager.current_index().map(|i| i as Arc<dyn SearchIndex>))
    }

    /// Passages whose similarity strictly exceeds the cutoff, best first.
    pub fn retrieve_dense(&self, query: &str) -> Result<Vec<String>> {
        let engine = self.query_engine.as_ref().ok_or(Precondition::PipelineNotInitialized)?;
        tracing::info!(query, "Processing query");
        let response = engine.query(query).wrap_as(ErrorKind::Rag, "Failed to run pipeline")?;

        let mut passages = Vec::new();
        for node in response.source_nodes {
            let Some(score) = node.score else { continue };
            if score > self.config.similarity_cutoff {
                tracing::debug!(score, text = truncate(node.text(), 100), "kept passage");
                passages.push(node.document.text().to_string());
            } else {
                tracing::debug!(score, "Skipped text with low relevance");
            }
        }
        tracing::info!("Found {} relevant results", passages.len());
        Ok(passages)
    }

    /// Up to `similarity_top_k` BM25 matches in ranking order.
    pub fn retrieve_sparse(&self, query: &str) -> Result<Vec<String>> {
        let index = self.index.as_ref().ok_or(Precondition::PipelineNotInitialized)?;
        tracing::info!(query, "Running BM25 search");
        let hits = index
            .search_by_keyword(query, self.config.similarity_top_k)
            .wrap_as(ErrorKind::Rag, "Failed to run BM25 pipeline")?;
        let texts: Vec<String> = hits.into_iter().map(|h| h.document.text().to_string()).collect();
        tracing::info!("BM25 search found {} results", texts.len());
        Ok(texts)
    }
}
