use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ragline_core::config::{Config, Settings};
use ragline_core::data_processor::{ChunkingConfig, DocumentProcessor};
use ragline_embed::EmbeddingService;
use ragline_pipeline::{IndexManager, IngestionOrchestrator, QueryProcessor, RetrievalConfig};
use ragline_vector::{LanceStore, VectorIndex};

#[derive(Parser)]
#[command(name = "ragline")]
#[command(about = "Ingest text into a persistent index and retrieve relevant passages", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (default: working directory)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed texts, build the index and save it, replacing any saved index
    Ingest {
        /// Text to ingest (repeatable)
        #[arg(long = "text")]
        texts: Vec<String>,

        /// Ingest every .txt file under this directory
        #[arg(long, conflicts_with = "texts")]
        dir: Option<PathBuf>,

        /// Split paragraphs into overlapping chunks
        #[arg(long)]
        chunk: bool,
    },

    /// Retrieve passages for a query from the saved index
    Query {
        query: String,

        #[arg(long, value_enum, default_value_t = Mode::Dense)]
        mode: Mode,

        /// Candidates requested per query (default: retrieval.similarity_top_k)
        #[arg(long)]
        top_k: Option<usize>,

        /// Dense-mode relevance cutoff (default: retrieval.similarity_cutoff)
        #[arg(long)]
        cutoff: Option<f32>,
    },

    /// Query through the default engine and print the compact response
    Ask { query: String },

    /// Show what is saved under the storage path
    Status,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Embedding similarity with a strict cutoff
    Dense,
    /// BM25 keyword ranking
    Sparse,
    /// Dense, then BM25 when dense finds nothing
    Fallback,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config_dir {
        Some(dir) => Config::load_in(dir, &env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string()))?,
        None => Config::load()?,
    };
    let settings = config.settings()?;
    init_tracing(&settings.logging.level);
    tracing::debug!(base_dir = %config.base_dir().display(), "configuration loaded");

    match cli.command {
        Commands::Ingest { texts, dir, chunk } => ingest(&config, &settings, texts, dir, chunk)?,
        Commands::Query { query, mode, top_k, cutoff } => {
            let manager = load_manager(&config)?;
            let mut retrieval = RetrievalConfig::from(settings.retrieval);
            if let Some(k) = top_k { retrieval.similarity_top_k = k; }
            if let Some(c) = cutoff { retrieval.similarity_cutoff = c; }
            let processor = QueryProcessor::new(&manager, retrieval);
            let results = match mode {
                Mode::Dense => processor.process_query(&query)?,
                Mode::Sparse => processor.process_query_bm25(&query)?,
                Mode::Fallback => processor.process_query_with_fallback(&query)?,
            };
            if results.is_empty() {
                println!("No relevant passages found.");
            }
            for (i, passage) in results.iter().enumerate() {
                println!("{}. {}", i + 1, passage);
            }
        }
        Commands::Ask { query } => {
            let manager = load_manager(&config)?;
            println!("{}", manager.query_index(&query)?);
        }
        Commands::Status => status(&config.storage_path()?)?,
    }
    Ok(())
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn ingest(config: &Config, settings: &Settings, texts: Vec<String>, dir: Option<PathBuf>, chunk: bool) -> anyhow::Result<()> {
    let mut orchestrator = IngestionOrchestrator::<VectorIndex>::from_config(config)?.with_progress(true);
    if chunk {
        orchestrator = orchestrator.with_processor(DocumentProcessor::with_chunking(ChunkingConfig {
            max_tokens: settings.ingest.max_tokens,
            overlap_percent: settings.ingest.overlap_percent,
        }));
    }
    let index = match dir {
        Some(dir) => orchestrator.ingest_directory(&dir)?,
        None if !texts.is_empty() => orchestrator.ingest_texts(texts)?,
        None => anyhow::bail!("nothing to ingest: pass --text or --dir"),
    };
    println!(
        "✅ Indexed {} documents into {}",
        index.len(),
        orchestrator.index_manager().storage_path().display()
    );
    Ok(())
}

fn load_manager(config: &Config) -> anyhow::Result<IndexManager> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));

    spinner.set_message("Loading embedding model...");
    let mut embeddings = EmbeddingService::from_config(config)?;
    let model = embeddings.load_model()?;

    spinner.set_message("Loading index...");
    let mut manager = IndexManager::new(config.storage_path()?)?;
    let loaded = manager.load_index(model);
    spinner.finish_and_clear();
    loaded?;
    Ok(manager)
}

fn status(storage: &Path) -> anyhow::Result<()> {
    println!("storage:   {}", storage.display());
    let store = LanceStore::new(storage);
    if !store.exists() {
        println!("no saved index");
        return Ok(());
    }
    let meta = store.meta()?;
    println!("model:     {}", meta.model_id);
    println!("dim:       {}", meta.dim);
    println!("documents: {}", meta.doc_count);
    println!("saved at:  {}", meta.saved_at.as_deref().unwrap_or("unknown"));
    Ok(())
}
