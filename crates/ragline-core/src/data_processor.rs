use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result, ResultExt};
use crate::traits::Embedder;
use crate::types::Document;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 500, overlap_percent: 0.2 }
    }
}

/// Turns raw text into [`Document`]s and attaches embeddings.
#[derive(Debug, Default)]
pub struct DocumentProcessor {
    chunking_config: Option<ChunkingConfig>,
}

impl DocumentProcessor {
    pub fn new() -> Self { Self::default() }

    /// Split inputs into paragraph passages before creating documents.
    pub fn with_chunking(chunking_config: ChunkingConfig) -> Self {
        Self { chunking_config: Some(chunking_config) }
    }

    /// One document per raw text (or per passage when chunking is enabled).
    pub fn create_documents(&self, raw_texts: Vec<String>) -> Vec<Document> {
        let documents: Vec<Document> = match self.chunking_config {
            None => raw_texts.into_iter().map(Document::new).collect(),
            Some(cfg) => raw_texts
                .iter()
                .flat_map(|t| chunk_content(t, cfg))
                .map(Document::new)
                .collect(),
        };
        tracing::debug!(count = documents.len(), "created documents");
        documents
    }

    pub fn add_embeddings(&self, embedder: &dyn Embedder, mut document: Document) -> Result<Document> {
        let embedding = embedder
            .embed_text(document.text())
            .wrap_as(ErrorKind::DocumentProcessing, "Failed to add embeddings")?;
        document.set_embedding(embedding);
        Ok(document)
    }

    pub fn batch_add_embeddings(&self, embedder: &dyn Embedder, documents: Vec<Document>) -> Result<Vec<Document>> {
        documents
            .into_iter()
            .map(|doc| self.add_embeddings(embedder, doc))
            .collect::<Result<Vec<_>>>()
            .wrap_as(ErrorKind::DocumentProcessing, "Failed to add batch embeddings")
    }

    /// Sets `title` to the text before the first period.
    pub fn extract_metadata(&self, mut document: Document) -> Document {
        let title = document.text().split('.').next().unwrap_or_default().trim().to_string();
        document.metadata_mut().insert("title".to_string(), serde_json::Value::String(title));
        document
    }

    /// Trims and lowercases the text; an existing embedding is discarded with it.
    pub fn preprocess_text(&self, mut document: Document) -> Document {
        let cleaned = document.text().trim().to_lowercase();
        document.set_text(cleaned);
        document
    }

    /// Reads every `.txt` file under `data_dir`, sorted by path.
    pub fn load_text_dir(&self, data_dir: &Path) -> Result<Vec<String>> {
        let files = list_txt_files(data_dir);
        if files.is_empty() {
            tracing::warn!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        let mut texts = Vec::with_capacity(files.len());
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::info!("Reading file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            texts.push(read_file_content(file_path).wrap_as(ErrorKind::DocumentProcessing, "Failed to read text file")?);
        }
        Ok(texts)
    }
}

fn read_file_content(file_path: &Path) -> std::io::Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn chunk_content(content: &str, cfg: ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    for paragraph in content.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() { continue; }
        if count_tokens(paragraph) <= cfg.max_tokens {
            chunks.push(paragraph.to_string());
        } else {
            chunks.extend(split_paragraph_with_overlap(paragraph, cfg));
        }
    }
    chunks
}

// ~0.75 words per token
fn count_tokens(text: &str) -> usize { let word_count = text.split_whitespace().count(); (word_count as f32 / 0.75) as usize }

fn split_paragraph_with_overlap(paragraph: &str, cfg: ChunkingConfig) -> Vec<String> {
    let words: Vec<&str> = paragraph.split_whitespace().collect();
    let words_per_chunk = ((cfg.max_tokens as f32 * 0.75) as usize).max(1);
    let overlap_words = ((words_per_chunk as f32 * cfg.overlap_percent) as usize).min(words_per_chunk - 1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + words_per_chunk).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end >= words.len() { break; }
        start = end - overlap_words;
    }
    chunks
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
    }
    txt_files.sort(); txt_files
}
