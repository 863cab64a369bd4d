//! A deterministic embedder for tests: hashes each word of the input text
//! into a fixed-dimension vector so that semantically identical labels
//! produce identical embeddings without pulling in a real model.

use super::{EmbeddingError, Embedder};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub const MOCK_DIMENSION: usize = 16;

pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: MOCK_DIMENSION,
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0_f32; self.dimension];
        for word in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let seed = hasher.finish();
            for (i, slot) in vec.iter_mut().enumerate() {
                let bit = (seed >> (i % 64)) & 1;
                *slot += if bit == 1 { 1.0 } else { -1.0 };
            }
        }
        vec
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for MockEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyResult);
        }
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_labels_embed_identically() {
        let embedder = MockEmbedder::new();
        let a = embedder.embed_one("apple").unwrap();
        let b = embedder.embed_one("apple").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_labels_embed_differently() {
        let embedder = MockEmbedder::new();
        let a = embedder.embed_one("apple").unwrap();
        let b = embedder.embed_one("car").unwrap();
        assert_ne!(a, b);
    }
}
