//! ragline-pipeline
//!
//! Index lifecycle ([`IndexManager`]), retrieval ([`RagPipeline`],
//! [`QueryEngine`], [`QueryProcessor`]) and end-to-end ingestion
//! ([`IngestionOrchestrator`]).

pub mod ingest;
pub mod manager;
pub mod query;
pub mod query_engine;
pub mod rag;

pub use ingest::IngestionOrchestrator;
pub use manager::IndexManager;
pub use query::QueryProcessor;
pub use query_engine::{QueryEngine, QueryEngineConfig, QueryResponse, ResponseMode, EMPTY_RESPONSE};
pub use rag::{RagPipeline, RetrievalConfig};
