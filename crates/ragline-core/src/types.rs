//! Domain types shared by the text, vector and pipeline crates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type DocId = String;
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A unit of indexed text.
///
/// - `id`: stable identity; assigned from the text digest when absent
///   (see [`crate::store::ensure_ids`])
/// - `text`: the raw UTF-8 payload
/// - `embedding`: vector computed from `text`; replacing the text drops it
/// - `metadata`: scalar attributes such as a derived `title`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    id: Option<DocId>,
    text: String,
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self { id: None, text: text.into(), embedding: None, metadata: Metadata::new() }
    }

    pub fn with_id(mut self, id: impl Into<DocId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn id(&self) -> Option<&str> { self.id.as_deref() }

    pub fn text(&self) -> &str { &self.text }

    pub fn embedding(&self) -> Option<&[f32]> { self.embedding.as_deref() }

    pub fn metadata(&self) -> &Metadata { &self.metadata }

    pub fn metadata_mut(&mut self) -> &mut Metadata { &mut self.metadata }

    pub fn is_embedded(&self) -> bool { self.embedding.is_some() }

    pub fn set_id(&mut self, id: impl Into<DocId>) { self.id = Some(id.into()); }

    pub fn set_embedding(&mut self, embedding: Vec<f32>) { self.embedding = Some(embedding); }

    /// Replaces the text. Any embedding computed from the old text is dropped.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.embedding = None;
    }
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
}

/// The minimal surface returned by the keyword engine.
///
/// `id` matches `Document::id`. `score` is engine-specific but higher is
/// always better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: DocId,
    pub score: f32,
    pub source: SourceKind,
}

/// A retrieval candidate: the matched document and its relevance score.
///
/// `score` is `None` when the producing engine attached no score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: Option<f32>,
    pub source: SourceKind,
}

impl ScoredDocument {
    pub fn text(&self) -> &str { self.document.text() }
}
