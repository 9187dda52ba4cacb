use anyhow::{anyhow, Result};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use ragline_core::traits::TextIndexer;
use ragline_core::{Document, DocumentStore, Embedder, ScoredDocument, SearchIndex, SourceKind};
use ragline_text::KeywordIndex;

use crate::similarity::cosine;
use crate::store::{IndexMeta, LanceStore};

/// In-memory vector index over embedded documents with a BM25 side index.
///
/// Dense search is an exact cosine scan; the collection sizes this serves do
/// not warrant an ANN structure. Persistence goes through [`LanceStore`].
pub struct VectorIndex {
	docstore: DocumentStore,
	embedder: Arc<dyn Embedder>,
	keywords: KeywordIndex,
	dim: usize,
}

impl VectorIndex {
	pub fn len(&self) -> usize { self.docstore.len() }

	pub fn is_empty(&self) -> bool { self.docstore.is_empty() }

	pub fn dim(&self) -> usize { self.dim }

	pub fn docstore(&self) -> &DocumentStore { &self.docstore }

	fn scored(&self, document: &Document, score: f32, source: SourceKind) -> ScoredDocument {
		ScoredDocument { document: document.clone(), score: Some(score), source }
	}
}

impl SearchIndex for VectorIndex {
	fn build(documents: DocumentStore, embedder: Arc<dyn Embedder>) -> Result<Self> {
		let dim = embedder.dim();
		for (pos, doc) in documents.iter().enumerate() {
			let id = doc.id().ok_or_else(|| anyhow!("document at position {pos} has no id"))?;
			let embedding = doc.embedding().ok_or_else(|| anyhow!("document {id} has no embedding"))?;
			anyhow::ensure!(
				embedding.len() == dim,
				"document {id} has a {}-dim embedding but the model produces {dim}",
				embedding.len()
			);
		}
		let keywords = KeywordIndex::from_documents(documents.documents())?;
		tracing::info!(docs = documents.len(), dim, model = embedder.model_id(), "vector index built");
		Ok(Self { docstore: documents, embedder, keywords, dim })
	}

	fn reload(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
		let (documents, meta) = LanceStore::new(dir).read()?;
		if meta.model_id != embedder.model_id() {
			tracing::warn!(saved = %meta.model_id, current = embedder.model_id(), "index was saved with a different embedding model");
		}
		anyhow::ensure!(
			meta.dim == embedder.dim(),
			"index was saved with {}-dim vectors, the current model produces {}",
			meta.dim,
			embedder.dim()
		);
		let mut store = DocumentStore::new();
		for doc in documents { store.insert(doc); }
		tracing::info!(docs = store.len(), saved_at = meta.saved_at.as_deref().unwrap_or("unknown"), "index reloaded");
		Self::build(store, embedder)
	}

	fn persist(&self, dir: &Path) -> Result<()> {
		let meta = IndexMeta {
			model_id: self.embedder.model_id().to_string(),
			dim: self.dim,
			doc_count: self.docstore.len(),
			saved_at: None,
		};
		LanceStore::new(dir).write(self.docstore.documents(), &meta)
	}

	fn search_by_vector(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
		anyhow::ensure!(query.len() == self.dim, "query has {} dims, index has {}", query.len(), self.dim);
		if k == 0 { return Ok(vec![]); }
		let mut scored: Vec<(&Document, f32)> = self
			.docstore
			.iter()
			.filter_map(|d| d.embedding().map(|e| (d, cosine(query, e))))
			.collect();
		// stable: equal scores keep insertion order
		scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
		scored.truncate(k);
		Ok(scored.into_iter().map(|(d, s)| self.scored(d, s, SourceKind::Vector)).collect())
	}

	fn search_by_keyword(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>> {
		let hits = self.keywords.search(query, k)?;
		let mut out = Vec::with_capacity(hits.len());
		for hit in hits {
			match self.docstore.get(&hit.id) {
				Some(doc) => out.push(self.scored(doc, hit.score, hit.source)),
				None => tracing::warn!(id = %hit.id, "keyword hit without a stored document"),
			}
		}
		Ok(out)
	}

	fn all_documents(&self) -> &[Document] { self.docstore.documents() }

	fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }
}
