//! Plaintext mirror variant (§4.7): identical control/data flow to
//! [`super::encrypted::EncryptedBackend`], with `EncVector` replaced by
//! normalized `Vec<f32>` and no oracle round-trips. Exists as a ground
//! truth for tests — it holds both graphs directly, the way a single
//! test process can but a real session never could.

use super::{Backend, PathCandidate};
use crate::embedding::{self, Embedder};
use crate::error::MatchError;
use crate::graph::{Edge, Graph, Uri};
use crate::paths::{h_r, GeneratedPath};
use crate::predictor::Predictor;
use crate::session::Session;
use async_trait::async_trait;
use std::collections::HashMap;

/// `(path embedding, |path|)` — §4.7 notes the plaintext variant uses the
/// *integer* path length where the encrypted variant uses `1/|path|`; the
/// two `h_p` formulas are therefore not numerically comparable, only
/// ranking-comparable (§9).
#[derive(Clone)]
pub struct PlaintextPathRepr {
    pub embedding: Vec<f32>,
    pub length: usize,
}

pub struct PlaintextBackend<'a> {
    pub server_graph: &'a Graph,
    pub client_graph: &'a Graph,
    pub server_embeddings: &'a HashMap<Uri, Vec<f32>>,
    pub client_embeddings: &'a HashMap<Uri, Vec<f32>>,
    pub embedder: &'a dyn Embedder,
    pub predictor: &'a dyn Predictor,
}

impl<'a> PlaintextBackend<'a> {
    fn embed_path(&self, edges: &[Edge]) -> Vec<f32> {
        let refs: Vec<&Edge> = edges.iter().collect();
        embedding::encode_path(self.embedder, &refs).unwrap_or_default()
    }

    fn paths_for(&self, session: &mut Session, graph: &Graph, root: &Uri) -> Vec<PathCandidate<PlaintextPathRepr>> {
        if let Some(cached) = session.ecache.get(root) {
            return to_candidates(self, cached);
        }
        let generated = h_r(graph, self.predictor, root, session.config.k);
        let out = to_candidates(self, &generated);
        session.ecache.insert(root.clone(), generated);
        out
    }
}

fn to_candidates(backend: &PlaintextBackend<'_>, paths: &[GeneratedPath]) -> Vec<PathCandidate<PlaintextPathRepr>> {
    paths
        .iter()
        .filter_map(|p| {
            let next = p.next_vertex()?.clone();
            let embedding = normalize_or_zero(backend.embed_path(&p.edges));
            Some(PathCandidate {
                next_vertex: next,
                repr: PlaintextPathRepr {
                    embedding,
                    length: p.len(),
                },
            })
        })
        .collect()
}

fn normalize_or_zero(v: Vec<f32>) -> Vec<f32> {
    if v.is_empty() {
        return v;
    }
    embedding::normalize(&v)
}

#[async_trait]
impl<'a> Backend for PlaintextBackend<'a> {
    type Repr = PlaintextPathRepr;

    async fn h_v(&mut self, session: &mut Session, a: &Uri, b: &Uri) -> Result<bool, MatchError> {
        let key = (a.clone(), b.clone());
        if let Some(&cached) = session.hv_cache.get(&key) {
            return Ok(cached);
        }
        let va = self
            .server_embeddings
            .get(a)
            .ok_or_else(|| MatchError::LookupMiss(a.to_string()))?;
        let vb = self
            .client_embeddings
            .get(b)
            .ok_or_else(|| MatchError::LookupMiss(b.to_string()))?;
        let dot: f32 = va.iter().zip(vb.iter()).map(|(x, y)| x * y).sum();
        let result = dot as f64 >= session.config.sigma;
        session.hv_cache.insert(key, result);
        Ok(result)
    }

    async fn h_p(
        &mut self,
        _session: &mut Session,
        a: &Self::Repr,
        b: &Self::Repr,
    ) -> Result<f64, MatchError> {
        let dot: f32 = a
            .embedding
            .iter()
            .zip(b.embedding.iter())
            .map(|(x, y)| x * y)
            .sum();
        let denom = (a.length + b.length) as f64;
        if denom == 0.0 {
            return Ok(0.0);
        }
        Ok(dot as f64 / denom)
    }

    async fn server_paths(&mut self, session: &mut Session, root: &Uri) -> Vec<PathCandidate<Self::Repr>> {
        self.paths_for(session, self.server_graph, root)
    }

    async fn client_paths(&mut self, session: &mut Session, root: &Uri) -> Result<Vec<PathCandidate<Self::Repr>>, MatchError> {
        Ok(self.paths_for(session, self.client_graph, root))
    }

    fn is_server_leaf(&self, uri: &Uri) -> bool {
        self.server_graph.is_leaf(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::mock::MockEmbedder;
    use crate::graph::Vertex;
    use crate::predictor::mock::FirstCandidatePredictor;

    fn apple_graph(prefix: &str) -> Graph {
        let mut g = Graph::new();
        g.add_vertex(Vertex::new(format!("{prefix}/apple"), "apple"));
        g
    }

    #[tokio::test]
    async fn identical_single_vertex_labels_are_similar() {
        let server = apple_graph("g1");
        let client = apple_graph("g2");
        let embedder = MockEmbedder::new();
        let predictor = FirstCandidatePredictor;

        let mut server_emb = HashMap::new();
        server_emb.insert(
            Uri::new("g1/apple"),
            embedding::normalize(&embedder.embed_one("apple").unwrap()),
        );
        let mut client_emb = HashMap::new();
        client_emb.insert(
            Uri::new("g2/apple"),
            embedding::normalize(&embedder.embed_one("apple").unwrap()),
        );

        let mut backend = PlaintextBackend {
            server_graph: &server,
            client_graph: &client,
            server_embeddings: &server_emb,
            client_embeddings: &client_emb,
            embedder: &embedder,
            predictor: &predictor,
        };
        let mut session = Session::new(crate::session::Config::default());
        let result = backend
            .h_v(&mut session, &Uri::new("g1/apple"), &Uri::new("g2/apple"))
            .await
            .unwrap();
        assert!(result);
    }
}
