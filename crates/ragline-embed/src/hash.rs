use std::hash::Hasher;

use anyhow::Result;
use twox_hash::XxHash64;

use ragline_core::text::terms;
use ragline_core::traits::Embedder;

/// Feature-hashing embedder: each non-stopword term adds 1.0 to bucket
/// `xxh64(term) % dim`, then the vector is L2-normalized.
///
/// Deterministic and model-free; texts sharing terms get positive cosine
/// similarity. Text without any indexable term maps to the zero vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("hash:xxh64:d{dim}") }
    }

    /// Like [`HashEmbedder::new`], but rejects a zero dimension.
    pub fn try_new(dim: usize) -> Result<Self> {
        anyhow::ensure!(dim > 0, "hash embedding dimension must be positive");
        Ok(Self::new(dim))
    }

    fn bucket(&self, term: &str) -> usize {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(term.as_bytes());
        (hasher.finish() % self.dim as u64) as usize
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        anyhow::ensure!(self.dim > 0, "hash embedding dimension must be positive");
        let mut v = vec![0f32; self.dim];
        for term in terms(text) { v[self.bucket(&term)] += 1.0; }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        Ok(v)
    }
}
