use anyhow::Result;
use std::fmt;
use std::sync::Arc;

use ragline_core::{ScoredDocument, SearchIndex};

pub const EMPTY_RESPONSE: &str = "Empty Response";

/// What a [`QueryEngine`] produces besides the retrieved candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
	/// Retrieval only.
	NoText,
	/// Retrieved passages joined into a single block of context.
	#[default]
	Compact,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryEngineConfig {
	pub similarity_top_k: usize,
	/// Candidates scoring below this are discarded; unscored ones too.
	pub similarity_cutoff: Option<f32>,
	pub response_mode: ResponseMode,
}

impl Default for QueryEngineConfig {
	fn default() -> Self {
		Self { similarity_top_k: 2, similarity_cutoff: None, response_mode: ResponseMode::Compact }
	}
}

#[derive(Debug, Clone)]
pub struct QueryResponse {
	pub response: Option<String>,
	/// Candidates in descending score order.
	pub source_nodes: Vec<ScoredDocument>,
}

impl fmt::Display for QueryResponse {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.response.as_deref().unwrap_or(EMPTY_RESPONSE))
	}
}

/// Dense query interface bound to one index.
#[derive(Clone)]
pub struct QueryEngine {
	index: Arc<dyn SearchIndex>,
	config: QueryEngineConfig,
}

impl QueryEngine {
	pub fn new(index: Arc<dyn SearchIndex>, config: QueryEngineConfig) -> Self { Self { index, config } }

	pub fn config(&self) -> &QueryEngineConfig { &self.config }

	pub fn retrieve(&self, query: &str) -> Result<Vec<ScoredDocument>> {
		let embedding = self.index.embedder().embed_text(query)?;
		let candidates = self.index.search_by_vector(&embedding, self.config.similarity_top_k)?;
		let Some(cutoff) = self.config.similarity_cutoff else { return Ok(candidates) };
		Ok(candidates.into_iter().filter(|c| c.score.is_some_and(|s| s >= cutoff)).collect())
	}

	pub fn query(&self, query: &str) -> Result<QueryResponse> {
		let source_nodes = self.retrieve(query)?;
		let response = match self.config.response_mode {
			ResponseMode::NoText => None,
			ResponseMode::Compact => Some(compact(&source_nodes)),
		};
		Ok(QueryResponse { response, source_nodes })
	}
}

fn compact(nodes: &[ScoredDocument]) -> String {
	if nodes.is_empty() { return EMPTY_RESPONSE.to_string(); }
	nodes.iter().map(ScoredDocument::text).collect::<Vec<_>>().join("\n\n")
}
