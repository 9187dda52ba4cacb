//! ragline-vector
//!
//! The concrete [`ragline_core::SearchIndex`]: exact cosine search over
//! embedded documents, BM25 through `ragline-text`, and LanceDB persistence.

pub mod index;
pub mod schema;
pub mod similarity;
pub mod store;

pub use index::VectorIndex;
pub use similarity::cosine;
pub use store::{content_hash, IndexMeta, LanceStore};
