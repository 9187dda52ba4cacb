use anyhow::anyhow;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;

use ragline_core::config::Config;
use ragline_core::data_processor::{ChunkingConfig, DocumentProcessor};
use ragline_core::{Document, ErrorKind, Result, ResultExt, SearchIndex};
use ragline_embed::EmbeddingService;
use ragline_vector::VectorIndex;

use crate::manager::IndexManager;

const EMBED_BATCH: usize = 64;

/// Raw text in, saved index out.
///
/// Any failing step aborts the run before the index is saved, so the
/// previously saved index stays as it was.
pub struct IngestionOrchestrator<I: SearchIndex = VectorIndex> {
    processor: DocumentProcessor,
    embeddings: EmbeddingService,
    index_manager: IndexManager<I>,
    show_progress: bool,
}

impl<I: SearchIndex + 'static> IngestionOrchestrator<I> {
    pub fn new(embeddings: EmbeddingService, index_manager: IndexManager<I>) -> Self {
        Self { processor: DocumentProcessor::new(), embeddings, index_manager, show_progress: false }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = config.settings()?;
        let index_manager = IndexManager::new(config.storage_path()?)?;
        let mut orchestrator = Self::new(EmbeddingService::from_config(config)?, index_manager);
        if settings.ingest.chunk {
            orchestrator.processor = DocumentProcessor::with_chunking(ChunkingConfig {
                max_tokens: settings.ingest.max_tokens,
                overlap_percent: settings.ingest.overlap_percent,
            });
        }
        Ok(orchestrator)
    }

    pub fn with_processor(mut self, processor: DocumentProcessor) -> Self {
        self.processor = processor;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn index_manager(&self) -> &IndexManager<I> { &self.index_manager }

    pub fn into_index_manager(self) -> IndexManager<I> { self.index_manager }

    pub fn embedding_service(&self) -> &EmbeddingService { &self.embeddings }

    /// Embeds, indexes and saves `raw_texts`, replacing the saved index.
    pub fn ingest_texts(&mut self, raw_texts: Vec<String>) -> Result<Arc<I>> {
        tracing::info!("Loading embedding model...");
        let model = self.embeddings.load_model()?;

        let documents: Vec<Document> = self
            .processor
            .create_documents(raw_texts)
            .into_iter()
            .map(|d| self.processor.extract_metadata(d))
            .collect();

        tracing::info!("Adding embeddings to {} documents...", documents.len());
        let documents = self.attach_embeddings(documents)?;

        tracing::info!("Creating searchable index...");
        let index = self.index_manager.create_index(documents, model)?;
        self.index_manager.save_index()?;
        tracing::info!("Index created and saved successfully");
        Ok(index)
    }

    /// Ingests every `.txt` file under `dir`.
    pub fn ingest_directory(&mut self, dir: &Path) -> Result<Arc<I>> {
        let texts = self.processor.load_text_dir(dir)?;
        tracing::info!(dir = %dir.display(), files = texts.len(), "Starting directory ingestion");
        self.ingest_texts(texts)
    }

    fn attach_embeddings(&self, mut documents: Vec<Document>) -> Result<Vec<Document>> {
        let pb = if self.show_progress { ProgressBar::new(documents.len() as u64) } else { ProgressBar::hidden() };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")
                .map(|s| s.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut position = 0usize;
        for batch in documents.chunks_mut(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|d| d.text().to_string()).collect();
            let vectors = self.embeddings.embed_many(&texts)?;
            for (doc, vector) in batch.iter_mut().zip(vectors) {
                match vector {
                    Some(v) => doc.set_embedding(v),
                    None => {
                        pb.abandon_with_message("embedding failed");
                        // embed_many only logs the cause; rerun the item to carry it
                        let cause = match self.embeddings.embed_one(doc.text()) {
                            Err(e) => anyhow::Error::new(e),
                            Ok(_) => anyhow!("no embedding for document {}", position + 1),
                        };
                        return Err::<Vec<Document>, _>(cause)
                            .wrap_as(ErrorKind::DocumentProcessing, "Failed to add batch embeddings");
                    }
                }
                position += 1;
            }
            pb.set_position(position as u64);
        }
        pb.finish_with_message("embeddings ready");
        Ok(documents)
    }
}
