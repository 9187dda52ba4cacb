use ragline_core::{ErrorKind, Result, ResultExt, SearchIndex};

use crate::manager::IndexManager;
use crate::rag::{RagPipeline, RetrievalConfig};

/// Query front-end over an [`IndexManager`]'s current index.
pub struct QueryProcessor {
    pipeline: RagPipeline,
}

impl QueryProcessor {
    /// Binds to the manager's current index if there is one. Without one every
    /// query fails until the processor is rebuilt.
    pub fn new<I: SearchIndex + 'static>(index_manager: &IndexManager<I>, config: RetrievalConfig) -> Self {
        let mut pipeline = RagPipeline::new(config);
        match pipeline.initialize_from(index_manager) {
            Ok(()) => tracing::info!("QueryProcessor initialized and ready to answer questions"),
            Err(_) => tracing::warn!("Index not found. Please ensure index is loaded."),
        }
        Self { pipeline }
    }

    pub fn is_ready(&self) -> bool { self.pipeline.is_initialized() }

    pub fn pipeline(&self) -> &RagPipeline { &self.pipeline }

    pub fn process_query(&self, query: &str) -> Result<Vec<String>> {
        let results = self.pipeline.retrieve_dense(query).wrap_as(ErrorKind::Query, "Failed to process query")?;
        if results.is_empty() {
            tracing::info!("No relevant information found");
        } else {
            tracing::info!("Found {} relevant answers", results.len());
        }
        Ok(results)
    }

    pub fn process_query_bm25(&self, query: &str) -> Result<Vec<String>> {
        let results = self.pipeline.retrieve_sparse(query).wrap_as(ErrorKind::Query, "Failed to process BM25 query")?;
        if results.is_empty() {
            tracing::info!("No matches found with BM25 search");
        } else {
            tracing::info!("BM25 search found {} matches", results.len());
        }
        Ok(results)
    }

    /// Dense retrieval, falling back to BM25 when nothing clears the cutoff.
    pub fn process_query_with_fallback(&self, query: &str) -> Result<Vec<String>> {
        let dense = self.process_query(query)?;
        if !dense.is_empty() {
            return Ok(dense);
        }
        tracing::info!("dense retrieval returned nothing, falling back to BM25");
        self.process_query_bm25(query)
    }

    /// Retrieved passages as one context block for answer synthesis.
    pub fn retrieve_context(&self, query: &str) -> Result<String> {
        Ok(self.process_query_with_fallback(query)?.join("\n\n"))
    }
}
