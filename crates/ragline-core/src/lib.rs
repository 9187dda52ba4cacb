//! ragline-core
//!
//! Domain types, the error taxonomy, trait seams between engines, identity
//! assignment and configuration loading. Figment merges `config.toml` +
//! `config.<env>.toml` + `APP_*` env vars; see [`config`].
#![warn(unused_imports)]
#![warn(unused_variables)]

pub mod config;
pub mod data_processor;
pub mod error;
pub mod store;
pub mod text;
pub mod traits;
pub mod types;

pub use error::{ErrorKind, Precondition, RagError, Result, ResultExt};
pub use store::{content_id, ensure_ids, DocumentStore};
pub use traits::{Embedder, SearchIndex, TextIndexer};
pub use types::{DocId, Document, Metadata, ScoredDocument, SearchHit, SourceKind};
