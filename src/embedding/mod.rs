//! Text embedding, L2 normalization, and the homomorphic-encryption
//! wrapper over the resulting vectors (§4.2).

mod enc_vector;
#[cfg(feature = "embeddings")]
pub mod fastembed_adapter;
pub mod mock;

pub use enc_vector::{deserialize, serialize, EncVector, HeContext, HeError, FIXED_POINT_SCALE};
#[cfg(feature = "embeddings")]
pub use fastembed_adapter::FastEmbedEmbedder;

use crate::graph::{Edge, Uri};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedder returned an empty batch")]
    EmptyResult,
    #[error("embedder failed: {0}")]
    ModelError(String),
}

/// External collaborator interface: encodes text into fixed-dimension
/// real vectors. The model backing this (fastembed, a remote service,
/// whatever) is out of scope; only this seam is owned by the crate.
pub trait Embedder: Send + Sync {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self
            .embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyResult)?)
    }
}

/// L2-normalizes a vector. A degenerate (all-zero) label embedding is
/// substituted with the zero vector rather than raising — its dot product
/// with anything is 0, which fails `h_v` cleanly (§7 numeric error policy).
pub fn normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vec.to_vec();
    }
    vec.iter().map(|x| x / norm).collect()
}

/// `encode_embedding(vertices)` → map uri -> vector, not yet normalized
/// (normalization happens on demand at encryption time per §4.2).
pub fn encode_embedding(
    embedder: &dyn Embedder,
    vertices: &[(Uri, String)],
) -> Result<HashMap<Uri, Vec<f32>>, EmbeddingError> {
    let labels: Vec<&str> = vertices.iter().map(|(_, l)| l.as_str()).collect();
    let vecs = embedder.embed_batch(&labels)?;
    Ok(vertices
        .iter()
        .map(|(uri, _)| uri.clone())
        .zip(vecs)
        .collect())
}

/// `encode_path(edges)` — join edge labels with a single space and embed
/// the resulting sentence as one vector.
pub fn encode_path(embedder: &dyn Embedder, edges: &[&Edge]) -> Result<Vec<f32>, EmbeddingError> {
    let sentence = edges
        .iter()
        .map(|e| e.label.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    embedder.embed_one(&sentence)
}
