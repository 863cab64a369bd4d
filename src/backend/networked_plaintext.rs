//! Plaintext mirror variant (§4.7), carried over the real wire taxonomy
//! instead of held in one process — `driver::run_networked_plaintext_session`'s
//! backend, selected by `--security-mode plaintext` (§6 "`security_mode`
//! boolean"). `original_source/app/src/main/python/server_unencrypted.py`
//! shows the original ships exactly this shape: a fully networked server
//! speaking the identical message-type taxonomy as the encrypted path,
//! just with plain vectors in place of ciphertexts and no masking.
//!
//! `h_v`/`h_p` are computed locally against the client's plaintext
//! embedding map received whole at key setup — no round trip needed,
//! since nothing is secret in this mode. Top-k paths (type 2) and the
//! lineage request (type 4) still go over the wire: the server never
//! holds the client's graph structure, encrypted or not.

use super::plaintext::PlaintextPathRepr;
use super::{Backend, PathCandidate};
use crate::embedding::{self, Embedder};
use crate::error::MatchError;
use crate::graph::{Edge, Graph, Uri};
use crate::oracle::OracleClient;
use crate::paths::{h_r, GeneratedPath};
use crate::predictor::Predictor;
use crate::session::Session;
use async_trait::async_trait;
use std::collections::HashMap;

pub struct NetworkedPlaintextBackend<'a> {
    pub server_graph: &'a Graph,
    /// S's own normalized vertex embeddings.
    pub server_embeddings: &'a HashMap<Uri, Vec<f32>>,
    /// C's normalized vertex embeddings, received whole at key setup —
    /// plaintext's counterpart to `EncryptedBackend::client_enc`.
    pub client_embeddings: &'a HashMap<Uri, Vec<f32>>,
    pub predictor: &'a dyn Predictor,
    pub embedder: &'a dyn Embedder,
    pub oracle: &'a mut dyn OracleClient,
}

impl<'a> NetworkedPlaintextBackend<'a> {
    fn embed_path(&self, edges: &[Edge]) -> Vec<f32> {
        let refs: Vec<&Edge> = edges.iter().collect();
        embedding::encode_path(self.embedder, &refs).unwrap_or_default()
    }

    fn to_candidates(&self, paths: &[GeneratedPath]) -> Vec<PathCandidate<PlaintextPathRepr>> {
        paths
            .iter()
            .filter_map(|p| {
                let next = p.next_vertex()?.clone();
                let embedding = normalize_or_zero(self.embed_path(&p.edges));
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
}

fn normalize_or_zero(v: Vec<f32>) -> Vec<f32> {
    if v.is_empty() {
        return v;
    }
    embedding::normalize(&v)
}

#[async_trait]
impl<'a> Backend for NetworkedPlaintextBackend<'a> {
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

    async fn h_p(&mut self, _session: &mut Session, a: &Self::Repr, b: &Self::Repr) -> Result<f64, MatchError> {
        let dot: f32 = a.embedding.iter().zip(b.embedding.iter()).map(|(x, y)| x * y).sum();
        let denom = (a.length + b.length) as f64;
        if denom == 0.0 {
            return Ok(0.0);
        }
        Ok(dot as f64 / denom)
    }

    async fn server_paths(&mut self, session: &mut Session, root: &Uri) -> Vec<PathCandidate<Self::Repr>> {
        if let Some(cached) = session.ecache.get(root) {
            return self.to_candidates(cached);
        }
        let generated = h_r(self.server_graph, self.predictor, root, session.config.k);
        let out = self.to_candidates(&generated);
        session.ecache.insert(root.clone(), generated);
        out
    }

    async fn client_paths(&mut self, session: &mut Session, root: &Uri) -> Result<Vec<PathCandidate<Self::Repr>>, MatchError> {
        let reply = self.oracle.top_k_paths(root, session.config.k as u32).await?;
        let mut out = Vec::with_capacity(reply.uris.len());
        for i in 0..reply.uris.len() {
            let next_vertex = Uri::new(reply.uris[i].clone());
            let embedding: Vec<f32> =
                bincode::deserialize(&reply.edges[i]).map_err(|e| MatchError::Wire(e.into()))?;
            let length: f64 =
                bincode::deserialize(&reply.length[i]).map_err(|e| MatchError::Wire(e.into()))?;
            out.push(PathCandidate {
                next_vertex,
                repr: PlaintextPathRepr {
                    embedding,
                    length: length.round() as usize,
                },
            });
        }
        Ok(out)
    }

    fn is_server_leaf(&self, uri: &Uri) -> bool {
        self.server_graph.is_leaf(uri)
    }
}
