use anyhow::Result;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::{doc, Index, IndexWriter, TantivyDocument};

use ragline_core::traits::TextIndexer;
use ragline_core::types::{Document, SearchHit, SourceKind};

use crate::tantivy_utils::{build_schema, register_tokenizer};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// BM25 ranking over document text, held entirely in RAM.
pub struct KeywordIndex {
	index: Index,
	id_field: Field,
	text_field: Field,
}

impl KeywordIndex {
	pub fn in_memory() -> Result<Self> {
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let id_field = schema.get_field("id")?;
		let text_field = schema.get_field("text")?;
		Ok(Self { index, id_field, text_field })
	}

	pub fn from_documents(documents: &[Document]) -> Result<Self> {
		let keywords = Self::in_memory()?;
		keywords.index(documents)?;
		Ok(keywords)
	}

	pub fn num_docs(&self) -> Result<u64> {
		Ok(self.index.reader()?.searcher().num_docs())
	}
}

impl TextIndexer for KeywordIndex {
	fn index(&self, documents: &[Document]) -> Result<()> {
		let mut index_writer: IndexWriter = self.index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
		for d in documents {
			let id = d.id().ok_or_else(|| anyhow::anyhow!("document without id cannot be keyword-indexed"))?;
			index_writer.add_document(doc!(
				self.id_field => id.to_string(),
				self.text_field => d.text().to_string(),
			))?;
		}
		index_writer.commit()?;
		tracing::debug!(count = documents.len(), "keyword index committed");
		Ok(())
	}

	fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		let reader = self.index.reader()?;
		let searcher = reader.searcher();
		// the collector preallocates for `limit`
		let limit = usize::try_from(searcher.num_docs()).map_or(k, |n| k.min(n));
		if limit == 0 { return Ok(vec![]); }
		let qp = QueryParser::for_index(&self.index, vec![self.text_field]);
		let (q, errors) = qp.parse_query_lenient(query);
		if !errors.is_empty() { tracing::debug!(?errors, "query parsed leniently"); }
		let top_docs = searcher.search(&q, &TopDocs::with_limit(limit))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let id = doc.get_first(self.id_field).and_then(|v| v.as_str()).unwrap_or("").to_string();
			hits.push(SearchHit { id, score, source: SourceKind::Text });
		}
		Ok(hits)
	}
}
