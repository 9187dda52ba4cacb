use std::sync::Arc;

use ragline_core::{ensure_ids, Document, DocumentStore, Embedder, SearchIndex, SourceKind};
use ragline_embed::HashEmbedder;
use ragline_vector::{LanceStore, VectorIndex};
use tempfile::TempDir;

fn embedder() -> Arc<dyn Embedder> { Arc::new(HashEmbedder::new(384)) }

fn embedded(embedder: &Arc<dyn Embedder>, texts: &[&str]) -> DocumentStore {
    let docs = texts
        .iter()
        .map(|t| Document::new(*t).with_embedding(embedder.embed_text(t).unwrap()))
        .collect();
    DocumentStore::from_documents(docs)
}

#[test]
fn dense_search_orders_by_cosine() {
    let e = embedder();
    let store = embedded(&e, &[
        "Python is a programming language",
        "Test driven development is important",
        "Python scripts",
    ]);
    let index = VectorIndex::build(store, e.clone()).expect("build");
    let q = e.embed_text("What is Python?").unwrap();

    let hits = index.search_by_vector(&q, 3).expect("search");
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|h| h.source == SourceKind::Vector));
    // one shared term out of two beats one out of three
    assert_eq!(hits[0].text(), "Python scripts");
    assert_eq!(hits[1].text(), "Python is a programming language");
    assert!(hits[2].score.unwrap().abs() < 1e-6);

    assert_eq!(index.search_by_vector(&q, 1).unwrap().len(), 1);
    assert!(index.search_by_vector(&q, 0).unwrap().is_empty());
    assert!(index.search_by_vector(&[1.0, 0.0], 1).is_err());
}

#[test]
fn keyword_search_returns_documents() {
    let e = embedder();
    let index = VectorIndex::build(embedded(&e, &["rust memory safety", "fast systems"]), e).expect("build");
    let hits = index.search_by_keyword("memory", 5).expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text(), "rust memory safety");
    assert_eq!(hits[0].source, SourceKind::Text);
    assert!(hits[0].score.unwrap() > 0.0);
}

#[test]
fn build_requires_embeddings_of_model_dim() {
    let e = embedder();
    let missing = DocumentStore::from_documents(vec![Document::new("no vector")]);
    assert!(VectorIndex::build(missing, e.clone()).is_err());

    let wrong = DocumentStore::from_documents(vec![Document::new("short").with_embedding(vec![1.0; 3])]);
    let err = VectorIndex::build(wrong, e).err().expect("dim mismatch");
    assert!(err.to_string().contains("3-dim"), "{err}");
}

#[test]
fn persist_and_reload_round_trip() {
    let tmp = TempDir::new().unwrap();
    let e = embedder();
    let mut docs = ensure_ids(vec![
        Document::new("zulu comes first"),
        Document::new("alpha comes second"),
        Document::new("mike comes third"),
    ]);
    docs[0].metadata_mut().insert("title".into(), serde_json::json!("zulu"));
    let docs = docs.into_iter().map(|d| { let v = e.embed_text(d.text()).unwrap(); d.with_embedding(v) }).collect();
    let index = VectorIndex::build(DocumentStore::from_documents(docs), e.clone()).expect("build");

    index.persist(tmp.path()).expect("persist");
    assert!(LanceStore::new(tmp.path()).exists());

    let reloaded = VectorIndex::reload(tmp.path(), e.clone()).expect("reload");
    assert_eq!(reloaded.all_documents(), index.all_documents());
    assert_eq!(reloaded.all_documents()[0].metadata().get("title"), Some(&serde_json::json!("zulu")));

    let q = e.embed_text("alpha").unwrap();
    let before = index.search_by_vector(&q, 2).unwrap();
    let after = reloaded.search_by_vector(&q, 2).unwrap();
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(b.document.id(), a.document.id());
        assert!((b.score.unwrap() - a.score.unwrap()).abs() < 1e-6);
    }

    // saving again replaces the previous contents
    let smaller = VectorIndex::build(embedded(&e, &["only one"]), e.clone()).expect("build");
    smaller.persist(tmp.path()).expect("persist again");
    assert_eq!(VectorIndex::reload(tmp.path(), e).expect("reload").len(), 1);
}

#[test]
fn empty_index_round_trips() {
    let tmp = TempDir::new().unwrap();
    let e = embedder();
    let index = VectorIndex::build(DocumentStore::new(), e.clone()).expect("build");
    index.persist(tmp.path()).expect("persist");
    let reloaded = VectorIndex::reload(tmp.path(), e.clone()).expect("reload");
    assert!(reloaded.is_empty());
    let q = e.embed_text("anything").unwrap();
    assert!(reloaded.search_by_vector(&q, 2).unwrap().is_empty());
}

#[test]
fn reload_rejects_other_dimension() {
    let tmp = TempDir::new().unwrap();
    let e = embedder();
    VectorIndex::build(embedded(&e, &["some text"]), e).unwrap().persist(tmp.path()).unwrap();
    assert!(VectorIndex::reload(tmp.path(), Arc::new(HashEmbedder::new(16))).is_err());
}

#[test]
fn reading_missing_index_fails() {
    let tmp = TempDir::new().unwrap();
    assert!(!LanceStore::new(tmp.path()).exists());
    assert!(LanceStore::new(tmp.path()).read().is_err());
}

#[test]
fn interrupted_save_keeps_previous_index() {
    let tmp = TempDir::new().unwrap();
    let e = embedder();
    VectorIndex::build(embedded(&e, &["kept passage"]), e.clone()).unwrap().persist(tmp.path()).unwrap();

    // as if the process died after moving the old database aside
    std::fs::rename(tmp.path().join("lancedb"), tmp.path().join("lancedb.previous")).unwrap();
    let store = LanceStore::new(tmp.path());
    assert!(store.exists());
    let reloaded = VectorIndex::reload(tmp.path(), e.clone()).expect("restored");
    assert_eq!(reloaded.all_documents()[0].text(), "kept passage");

    VectorIndex::build(embedded(&e, &["newer passage"]), e.clone()).unwrap().persist(tmp.path()).unwrap();
    assert!(!tmp.path().join("lancedb.previous").exists());
    assert!(!tmp.path().join("lancedb.staging").exists());
    assert_eq!(VectorIndex::reload(tmp.path(), e).unwrap().all_documents()[0].text(), "newer passage");
}
