//! Production `Embedder` backed by fastembed (ONNX Runtime), gated behind
//! the `embeddings` feature (§4.2's external collaborator seam). Disabled
//! by default; `MockEmbedder` covers the test suite.

use super::{Embedder, EmbeddingError};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Mutex;

/// Wraps `fastembed::TextEmbedding` in a `Mutex` because its `embed` method
/// requires `&mut self`, while `Embedder` uses `&self`.
pub struct FastEmbedEmbedder {
    model: Mutex<TextEmbedding>,
}

impl FastEmbedEmbedder {
    pub fn new(model: EmbeddingModel) -> Result<Self, EmbeddingError> {
        let options = InitOptions::new(model).with_show_download_progress(false);
        let embedding = TextEmbedding::try_new(options).map_err(|e| EmbeddingError::ModelError(e.to_string()))?;
        Ok(Self { model: Mutex::new(embedding) })
    }

    pub fn default_model() -> Result<Self, EmbeddingError> {
        Self::new(EmbeddingModel::NomicEmbedTextV15)
    }
}

impl Embedder for FastEmbedEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut model = self.model.lock().unwrap();
        let embeddings = model.embed(texts.to_vec(), None).map_err(|e| EmbeddingError::ModelError(e.to_string()))?;
        if embeddings.is_empty() {
            return Err(EmbeddingError::EmptyResult);
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // requires model download
    fn fastembed_default_model_embeds_text() {
        let embedder = FastEmbedEmbedder::default_model().expect("model should load");
        let result = embedder.embed_batch(&["hello world"]).expect("should embed");
        assert_eq!(result.len(), 1);
        assert!(!result[0].is_empty());
    }
}
