use std::path::Path;
use std::sync::Arc;

use ragline_core::data_processor::DocumentProcessor;
use ragline_core::{Document, DocumentStore, Embedder, ErrorKind, Precondition, ScoredDocument, SearchIndex, SourceKind};
use ragline_embed::HashEmbedder;
use ragline_pipeline::{
    IndexManager, QueryEngine, QueryEngineConfig, QueryProcessor, RagPipeline, ResponseMode, RetrievalConfig, EMPTY_RESPONSE,
};
use tempfile::TempDir;

const PYTHON: &str = "Python is a programming language";
const TDD: &str = "Test driven development is important";

fn embedder() -> Arc<dyn Embedder> { Arc::new(HashEmbedder::new(384)) }

fn embedded_docs(embedder: &Arc<dyn Embedder>, texts: &[&str]) -> Vec<Document> {
    let processor = DocumentProcessor::new();
    let docs = processor.create_documents(texts.iter().map(|t| t.to_string()).collect());
    processor.batch_add_embeddings(embedder.as_ref(), docs).expect("embed")
}

fn manager_with(tmp: &TempDir, texts: &[&str]) -> IndexManager {
    let e = embedder();
    let mut manager = IndexManager::new(tmp.path().join("index_storage")).expect("manager");
    manager.create_index(embedded_docs(&e, texts), e).expect("create");
    manager
}

/// Returns its documents in stored order, scored from their `score` metadata.
struct FixedIndex {
    docs: Vec<Document>,
    embedder: Arc<dyn Embedder>,
}

impl FixedIndex {
    fn scored(&self, k: usize, source: SourceKind) -> Vec<ScoredDocument> {
        self.docs
            .iter()
            .take(k)
            .map(|d| ScoredDocument {
                document: d.clone(),
                score: d.metadata().get("score").and_then(|v| v.as_f64()).map(|s| s as f32),
                source,
            })
            .collect()
    }
}

impl SearchIndex for FixedIndex {
    fn build(documents: DocumentStore, embedder: Arc<dyn Embedder>) -> anyhow::Result<Self> {
        let docs = documents.into_documents();
        if docs.iter().any(|d| d.text().contains("unbuildable")) {
            anyhow::bail!("construction failed for test");
        }
        Ok(Self { docs, embedder })
    }

    fn reload(_dir: &Path, _embedder: Arc<dyn Embedder>) -> anyhow::Result<Self> {
        anyhow::bail!("fixed index cannot be reloaded")
    }

    fn persist(&self, _dir: &Path) -> anyhow::Result<()> { Ok(()) }

    fn search_by_vector(&self, _query: &[f32], k: usize) -> anyhow::Result<Vec<ScoredDocument>> {
        Ok(self.scored(k, SourceKind::Vector))
    }

    fn search_by_keyword(&self, _query: &str, k: usize) -> anyhow::Result<Vec<ScoredDocument>> {
        Ok(self.scored(k, SourceKind::Text))
    }

    fn all_documents(&self) -> &[Document] { &self.docs }

    fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }
}

fn scored_doc(text: &str, score: Option<f64>) -> Document {
    let mut doc = Document::new(text);
    if let Some(s) = score {
        doc.metadata_mut().insert("score".into(), serde_json::json!(s));
    }
    doc
}

fn fixed_manager(tmp: &TempDir) -> IndexManager<FixedIndex> {
    let mut manager = IndexManager::<FixedIndex>::new(tmp.path()).expect("manager");
    let docs = vec![
        scored_doc("high", Some(0.9)),
        scored_doc("medium", Some(0.7)),
        scored_doc("at cutoff", Some(0.5)),
        scored_doc("unscored", None),
        scored_doc("low", Some(0.3)),
    ];
    manager.create_index(docs, Arc::new(HashEmbedder::new(4))).expect("create");
    manager
}

#[test]
fn python_question_returns_python_passage() {
    let tmp = TempDir::new().unwrap();
    let manager = manager_with(&tmp, &[PYTHON, TDD]);
    let mut pipeline = RagPipeline::default();
    pipeline.initialize_from(&manager).expect("init");

    let results = pipeline.retrieve_dense("What is Python?").expect("dense");
    assert!(!results.is_empty());
    assert_eq!(results[0], PYTHON);
    assert_eq!(results.len(), 1);
}

#[test]
fn dense_cutoff_is_strict() {
    let tmp = TempDir::new().unwrap();
    let manager = fixed_manager(&tmp);
    let mut pipeline = RagPipeline::new(RetrievalConfig { similarity_top_k: 10, similarity_cutoff: 0.5 });
    pipeline.initialize_from(&manager).expect("init");
    assert_eq!(pipeline.retrieve_dense("anything").unwrap(), vec!["high", "medium"]);

    let mut stricter = RagPipeline::new(RetrievalConfig { similarity_top_k: 10, similarity_cutoff: 0.7 });
    stricter.initialize_from(&manager).expect("init");
    assert_eq!(stricter.retrieve_dense("anything").unwrap(), vec!["high"]);

    let mut nothing = RagPipeline::new(RetrievalConfig { similarity_top_k: 10, similarity_cutoff: 0.95 });
    nothing.initialize_from(&manager).expect("init");
    assert!(nothing.retrieve_dense("anything").unwrap().is_empty());
}

#[test]
fn engine_level_cutoff_is_inclusive() {
    let tmp = TempDir::new().unwrap();
    let manager = fixed_manager(&tmp);
    let engine = manager
        .as_query_engine(QueryEngineConfig {
            similarity_top_k: 10,
            similarity_cutoff: Some(0.5),
            response_mode: ResponseMode::NoText,
        })
        .expect("engine");
    let texts: Vec<String> = engine.retrieve("q").unwrap().iter().map(|n| n.text().to_string()).collect();
    assert_eq!(texts, vec!["high", "medium", "at cutoff"]);

    let response = engine.query("q").unwrap();
    assert!(response.response.is_none());
    assert_eq!(response.source_nodes.len(), 3);
}

#[test]
fn sparse_ignores_cutoff_but_respects_top_k() {
    let tmp = TempDir::new().unwrap();
    let manager = fixed_manager(&tmp);
    let mut pipeline = RagPipeline::new(RetrievalConfig { similarity_top_k: 4, similarity_cutoff: 0.99 });
    pipeline.initialize_from(&manager).expect("init");
    assert_eq!(pipeline.retrieve_sparse("q").unwrap(), vec!["high", "medium", "at cutoff", "unscored"]);
}

#[test]
fn sparse_top_k_bound_on_real_index() {
    let tmp = TempDir::new().unwrap();
    let manager = manager_with(&tmp, &[
        "rust ownership",
        "rust borrowing rules",
        "rust lifetimes",
        "rust traits and generics",
        "cooking pasta",
    ]);
    let mut pipeline = RagPipeline::default();
    pipeline.initialize_from(&manager).expect("init");
    assert_eq!(pipeline.retrieve_sparse("rust").unwrap().len(), 2);

    let mut wider = RagPipeline::new(RetrievalConfig { similarity_top_k: 3, similarity_cutoff: 0.5 });
    wider.initialize_from(&manager).expect("init");
    let hits = wider.retrieve_sparse("rust").unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|t| t.starts_with("rust")));
}

#[test]
fn retrieving_before_initialize_is_a_precondition_error() {
    let pipeline = RagPipeline::default();
    assert!(!pipeline.is_initialized());
    let err = pipeline.retrieve_dense("What is Python?").unwrap_err();
    assert_eq!(err.precondition(), Some(&Precondition::PipelineNotInitialized));
    assert_eq!(err.kind(), None);
    assert_eq!(err.to_string(), "Pipeline not initialized");

    let err = pipeline.retrieve_sparse("python").unwrap_err();
    assert_eq!(err.precondition(), Some(&Precondition::PipelineNotInitialized));
}

#[test]
fn initialize_without_index_fails() {
    let mut pipeline = RagPipeline::default();
    let err = pipeline.initialize(None).unwrap_err();
    assert_eq!(err.precondition(), Some(&Precondition::MissingIndex));
    assert_eq!(err.to_string(), "Index cannot be None");

    let tmp = TempDir::new().unwrap();
    let empty: IndexManager = IndexManager::new(tmp.path()).unwrap();
    assert!(pipeline.initialize_from(&empty).is_err());
    assert!(!pipeline.is_initialized());
}

#[test]
fn reinitialize_rebinds_to_new_index() {
    let tmp_a = TempDir::new().unwrap();
    let tmp_b = TempDir::new().unwrap();
    let a = manager_with(&tmp_a, &[PYTHON]);
    let b = manager_with(&tmp_b, &["Python scripts"]);
    let mut pipeline = RagPipeline::default();
    pipeline.initialize_from(&a).unwrap();
    assert_eq!(pipeline.retrieve_dense("python").unwrap(), vec![PYTHON]);
    pipeline.initialize_from(&b).unwrap();
    assert_eq!(pipeline.retrieve_dense("python").unwrap(), vec!["Python scripts"]);
}

#[test]
fn empty_index_is_queryable() {
    let tmp = TempDir::new().unwrap();
    let manager = manager_with(&tmp, &[]);
    let index = manager.current_index().expect("current");
    assert!(index.all_documents().is_empty());

    let mut pipeline = RagPipeline::default();
    pipeline.initialize_from(&manager).expect("init");
    assert!(pipeline.retrieve_dense("What is Python?").unwrap().is_empty());
    assert!(pipeline.retrieve_sparse("python").unwrap().is_empty());
    assert_eq!(manager.query_index("What is Python?").unwrap(), EMPTY_RESPONSE);
}

#[test]
fn save_before_create_is_index_error() {
    let tmp = TempDir::new().unwrap();
    let manager: IndexManager = IndexManager::new(tmp.path()).unwrap();
    let err = manager.save_index().unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Index));
    assert_eq!(err.precondition(), Some(&Precondition::NoIndexToSave));
    assert_eq!(err.to_string(), "Failed to save index: No index to save. Create an index first.");
}

#[test]
fn save_and_load_round_trip() {
    let tmp = TempDir::new().unwrap();
    let texts = [PYTHON, TDD, "Python scripts automate development"];
    let manager = manager_with(&tmp, &texts);
    manager.save_index().expect("save");

    let mut reloaded: IndexManager = IndexManager::new(manager.storage_path()).unwrap();
    let index = reloaded.load_index(embedder()).expect("load");

    let original = manager.current_index().unwrap();
    assert_eq!(index.all_documents(), original.all_documents());
    for doc in original.all_documents() {
        assert!(doc.id().is_some_and(|id| id.starts_with("doc_")));
    }

    let mut before = RagPipeline::new(RetrievalConfig { similarity_top_k: 3, similarity_cutoff: 0.1 });
    before.initialize_from(&manager).unwrap();
    let mut after = RagPipeline::new(RetrievalConfig { similarity_top_k: 3, similarity_cutoff: 0.1 });
    after.initialize_from(&reloaded).unwrap();
    for q in ["What is Python?", "development", "important python scripts"] {
        assert_eq!(before.retrieve_dense(q).unwrap(), after.retrieve_dense(q).unwrap(), "dense {q:?}");
        assert_eq!(before.retrieve_sparse(q).unwrap(), after.retrieve_sparse(q).unwrap(), "sparse {q:?}");
    }
}

#[test]
fn load_requires_storage_path() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("gone");
    let mut manager: IndexManager = IndexManager::new(&path).unwrap();
    std::fs::remove_dir_all(&path).unwrap();
    let err = manager.load_index(embedder()).err().expect("missing storage");
    assert!(matches!(err.precondition(), Some(Precondition::StorageNotFound(p)) if p == &path));
    assert_eq!(err.kind(), None);
}

#[test]
fn load_without_saved_index_is_index_error() {
    let tmp = TempDir::new().unwrap();
    let mut manager: IndexManager = IndexManager::new(tmp.path()).unwrap();
    let err = manager.load_index(embedder()).err().expect("nothing saved");
    assert_eq!(err.kind(), Some(ErrorKind::Index));
    assert!(err.to_string().starts_with("Failed to load index: "));
    assert!(manager.current_index().is_none());
}

#[test]
fn failed_create_keeps_current_index() {
    let tmp = TempDir::new().unwrap();
    let mut manager = fixed_manager(&tmp);
    let before = manager.current_index().unwrap();
    let err = manager
        .create_index(vec![Document::new("unbuildable text")], Arc::new(HashEmbedder::new(4)))
        .err()
        .expect("build fails");
    assert_eq!(err.kind(), Some(ErrorKind::Index));
    assert_eq!(err.to_string(), "Failed to create index: construction failed for test");
    assert!(Arc::ptr_eq(&before, &manager.current_index().unwrap()));
}

#[test]
fn create_index_assigns_ids() {
    let tmp = TempDir::new().unwrap();
    let manager = fixed_manager(&tmp);
    let index = manager.current_index().unwrap();
    assert!(index.all_documents().iter().all(|d| d.id().is_some()));
    assert_eq!(index.all_documents()[0].id(), Some(ragline_core::content_id("high").as_str()));
}

#[test]
fn query_index_needs_an_index() {
    let tmp = TempDir::new().unwrap();
    let empty: IndexManager = IndexManager::new(tmp.path()).unwrap();
    let err = empty.query_index("What is Python?").unwrap_err();
    assert_eq!(err.precondition(), Some(&Precondition::NoIndexLoaded));

    let manager = manager_with(&TempDir::new().unwrap(), &[PYTHON, TDD]);
    assert_eq!(manager.query_index("What is Python?").unwrap(), format!("{PYTHON}\n\n{TDD}"));
}

#[test]
fn query_processor_falls_back_to_bm25() {
    let tmp = TempDir::new().unwrap();
    let manager = manager_with(&tmp, &[PYTHON, TDD]);
    let processor = QueryProcessor::new(&manager, RetrievalConfig::default());
    assert!(processor.is_ready());

    // one of four terms: cosine is exactly 0.5, which the strict cutoff drops
    assert!(processor.process_query("development").unwrap().is_empty());
    assert_eq!(processor.process_query_bm25("development").unwrap(), vec![TDD]);
    assert_eq!(processor.process_query_with_fallback("development").unwrap(), vec![TDD]);
    assert_eq!(processor.process_query_with_fallback("What is Python?").unwrap(), vec![PYTHON]);
    assert_eq!(processor.retrieve_context("development").unwrap(), TDD);
}

#[test]
fn query_processor_without_index_reports_query_errors() {
    let tmp = TempDir::new().unwrap();
    let manager: IndexManager = IndexManager::new(tmp.path()).unwrap();
    let processor = QueryProcessor::new(&manager, RetrievalConfig::default());
    assert!(!processor.is_ready());

    let err = processor.process_query("python").unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Query));
    assert_eq!(err.precondition(), Some(&Precondition::PipelineNotInitialized));
    assert_eq!(err.to_string(), "Failed to process query: Pipeline not initialized");

    let err = processor.process_query_bm25("python").unwrap_err();
    assert!(err.to_string().starts_with("Failed to process BM25 query"));
}

#[test]
fn query_engine_compact_mode_joins_passages() {
    let tmp = TempDir::new().unwrap();
    let manager = manager_with(&tmp, &[PYTHON, TDD]);
    let index = manager.current_index().unwrap();
    let engine = QueryEngine::new(index, QueryEngineConfig { similarity_top_k: 1, ..QueryEngineConfig::default() });
    let response = engine.query("What is Python?").unwrap();
    assert_eq!(response.to_string(), PYTHON);
    assert_eq!(response.source_nodes.len(), 1);
    assert_eq!(response.source_nodes[0].source, SourceKind::Vector);
}
