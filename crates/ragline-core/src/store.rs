//! Content-derived identities and the ordered document collection.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::types::{DocId, Document};

pub const ID_PREFIX: &str = "doc_";
const DIGEST_HEX_LEN: usize = 16;

/// `doc_` followed by the first 16 hex chars of the SHA-256 of `text`.
///
/// Identical texts map to the same id.
pub fn content_id(text: &str) -> DocId {
    let digest = format!("{:x}", Sha256::digest(text.as_bytes()));
    format!("{ID_PREFIX}{}", &digest[..DIGEST_HEX_LEN])
}

/// Assigns a content id to every document lacking one. Existing ids are kept.
pub fn ensure_ids(mut documents: Vec<Document>) -> Vec<Document> {
    for doc in &mut documents {
        if doc.id().is_none() {
            let id = content_id(doc.text());
            tracing::debug!(%id, "assigned document id");
            doc.set_id(id);
        }
    }
    documents
}

/// Insertion-ordered documents keyed by id.
///
/// Inserting a document whose id is already present replaces the earlier entry
/// in place, so content-identical documents collapse into one.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    docs: Vec<Document>,
    positions: HashMap<DocId, usize>,
}

impl DocumentStore {
    pub fn new() -> Self { Self::default() }

    /// Runs [`ensure_ids`] and inserts every document.
    pub fn from_documents(documents: Vec<Document>) -> Self {
        let mut store = Self::new();
        for doc in ensure_ids(documents) {
            store.insert(doc);
        }
        store
    }

    /// Returns the id the document was stored under.
    pub fn insert(&mut self, mut doc: Document) -> DocId {
        let id = match doc.id() {
            Some(id) => id.to_string(),
            None => {
                let id = content_id(doc.text());
                doc.set_id(id.clone());
                id
            }
        };
        match self.positions.get(&id) {
            Some(&pos) => self.docs[pos] = doc,
            None => {
                self.positions.insert(id.clone(), self.docs.len());
                self.docs.push(doc);
            }
        }
        id
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.positions.get(id).map(|&pos| &self.docs[pos])
    }

    pub fn contains(&self, id: &str) -> bool { self.positions.contains_key(id) }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn documents(&self) -> &[Document] { &self.docs }

    pub fn iter(&self) -> impl Iterator<Item = &Document> { self.docs.iter() }

    pub fn into_documents(self) -> Vec<Document> { self.docs }
}
