//! The real, homomorphically-encrypted backend (§4.3): `h_v`/`h_p` are
//! masked-ciphertext oracle round trips (§6 message types 1 and 3);
//! server-side paths come from local `h_r`, client-side paths from a
//! type-2 oracle round trip.

use super::{Backend, PathCandidate};
use crate::embedding::{self, EncVector, Embedder, HeContext};
use crate::error::MatchError;
use crate::graph::{Edge, Graph, Uri};
use crate::oracle::OracleClient;
use crate::paths::h_r;
use crate::predictor::Predictor;
use crate::session::Session;
use async_trait::async_trait;
use std::collections::HashMap;

/// An encrypted path embedding paired with its length ciphertext — what
/// §4.5 step 4 calls "the encrypted path embedding" and "the encrypted
/// length ciphertext `1/|path|`".
#[derive(Clone)]
pub struct EncryptedPathRepr {
    pub path_ct: EncVector,
    pub len_ct: EncVector,
}

pub struct EncryptedBackend<'a> {
    pub server_graph: &'a Graph,
    pub he: &'a HeContext,
    /// S's own vertex embeddings, encrypted under C's shared public
    /// context at session start (§2 step 2) — covers every vertex in
    /// `server_graph`.
    pub server_enc: &'a HashMap<Uri, EncVector>,
    /// C's vertex embeddings, received whole at key setup (§2 step 1) —
    /// covers every vertex in C's graph.
    pub client_enc: &'a HashMap<Uri, EncVector>,
    pub predictor: &'a dyn Predictor,
    pub embedder: &'a dyn Embedder,
    pub oracle: &'a mut dyn OracleClient,
}

impl<'a> EncryptedBackend<'a> {
    fn sigma_scaled(&self, sigma: f64) -> i64 {
        (sigma * embedding::FIXED_POINT_SCALE * embedding::FIXED_POINT_SCALE).round() as i64
    }
}

#[async_trait]
impl<'a> Backend for EncryptedBackend<'a> {
    type Repr = EncryptedPathRepr;

    async fn h_v(&mut self, session: &mut Session, a: &Uri, b: &Uri) -> Result<bool, MatchError> {
        let key = (a.clone(), b.clone());
        if let Some(&cached) = session.hv_cache.get(&key) {
            return Ok(cached);
        }
        let ct1 = self
            .server_enc
            .get(a)
            .ok_or_else(|| MatchError::LookupMiss(a.to_string()))?;
        let ct2 = self
            .client_enc
            .get(b)
            .ok_or_else(|| MatchError::LookupMiss(b.to_string()))?;

        let sigma_scaled = self.sigma_scaled(session.config.sigma);
        let masked = ct1.dot(ct2).sub_scalar(sigma_scaled).scale(session.mask);
        let result = self.oracle.vertex_similarity(&masked).await?;
        session.hv_cache.insert(key, result);
        Ok(result)
    }

    async fn h_p(
        &mut self,
        session: &mut Session,
        a: &Self::Repr,
        b: &Self::Repr,
    ) -> Result<f64, MatchError> {
        let dot = a.path_ct.dot(&b.path_ct);
        let len_sum = a.len_ct.add(&b.len_ct);
        let product = dot.dot(&len_sum);
        let masked = product.scale(0.25 * session.mask);
        self.oracle.path_similarity(&masked).await
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
            let path_ct = embedding::deserialize(&reply.edges[i])?;
            let len_ct = embedding::deserialize(&reply.length[i])?;
            out.push(PathCandidate {
                next_vertex,
                repr: EncryptedPathRepr { path_ct, len_ct },
            });
        }
        Ok(out)
    }

    fn is_server_leaf(&self, uri: &Uri) -> bool {
        self.server_graph.is_leaf(uri)
    }
}

impl<'a> EncryptedBackend<'a> {
    fn to_candidates(&self, paths: &[crate::paths::GeneratedPath]) -> Vec<PathCandidate<EncryptedPathRepr>> {
        paths
            .iter()
            .filter_map(|p| {
                let next = p.next_vertex()?;
                let path_ct = self.encrypt_path(&p.edges).ok()?;
                let len_ct = self.he.encrypt_scalar(1.0 / p.len().max(1) as f64).ok()?;
                Some(PathCandidate {
                    next_vertex: next.clone(),
                    repr: EncryptedPathRepr { path_ct, len_ct },
                })
            })
            .collect()
    }

    fn encrypt_path(&self, edges: &[Edge]) -> Result<EncVector, MatchError> {
        let refs: Vec<&Edge> = edges.iter().collect();
        let sentence_embedding = embedding::encode_path(self.embedder, &refs)
            .map_err(|e| MatchError::OracleUnavailable(e.to_string()))?;
        Ok(self.he.encrypt(&sentence_embedding, true)?)
    }
}
