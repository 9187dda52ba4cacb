//! ragline-text
//!
//! Tantivy-based BM25 keyword index used for sparse retrieval. The index is
//! rebuilt in RAM from a document set; it never touches disk.

pub mod index;
pub mod tantivy_utils;

pub use index::KeywordIndex;
