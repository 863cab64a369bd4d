//! The driver loop (§4.6): S's end-to-end session — match every server
//! vertex against every client vertex, collect `PI`, merge in descending
//! server out-degree order, dedup, and report.
//!
//! Split into [`compute_pi`] (the matching pass, generic over [`Backend`])
//! and [`merge_matches`] (the merge pass, generic over [`LineageSource`])
//! rather than one function taking both: a [`Backend`] borrows the server
//! graph immutably for the whole matching pass, and the merge pass needs
//! to mutate it, so the two cannot be interleaved behind one borrow.

use crate::backend::Backend;
use crate::error::MatchError;
use crate::graph::{merge_subgraph, remove_duplicate_vertices_by_label_and_edge_label, Graph, Uri};
use crate::oracle::OracleClient;
use crate::para_match::para_match;
use crate::session::Session;
use async_trait::async_trait;

/// Source of a client-side lineage subgraph for the merge phase. A real
/// session asks the oracle (message type 4, §6); the plaintext
/// ground-truth variant (§4.7) holds both graphs in the same process and
/// extracts it directly.
#[async_trait]
pub trait LineageSource: Send {
    async fn lineage(&mut self, client_uri: &Uri) -> Result<Graph, MatchError>;
}

/// [`LineageSource`] backed by direct access to the client's graph —
/// what the plaintext mirror variant (§4.7) and single-process tests use.
pub struct DirectLineageSource<'a> {
    pub client_graph: &'a Graph,
}

#[async_trait]
impl<'a> LineageSource for DirectLineageSource<'a> {
    async fn lineage(&mut self, client_uri: &Uri) -> Result<Graph, MatchError> {
        Ok(self.client_graph.extract_lineage_set(client_uri))
    }
}

/// [`LineageSource`] backed by a live [`crate::oracle::OracleClient`]'s
/// type-4 RPC — what the encrypted session uses.
pub struct OracleLineageSource<'a> {
    pub oracle: &'a mut dyn crate::oracle::OracleClient,
}

#[async_trait]
impl<'a> LineageSource for OracleLineageSource<'a> {
    async fn lineage(&mut self, client_uri: &Uri) -> Result<Graph, MatchError> {
        self.oracle.lineage(client_uri).await
    }
}

/// `PI`: server vertex uri -> every client vertex uri it matched (§4.6),
/// in the order the matching pass discovered them.
pub type MatchMap = Vec<(Uri, Vec<Uri>)>;

/// Final accounting for a completed session, reported via `tracing` at
/// the end of the merge phase (§A.2/A.5 of the expanded spec).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub pairs_matched: usize,
    pub vertices_merged: usize,
}

/// The matching pass (§4.6 first half): for every server vertex in
/// `server_order`, reset the match cache, then for every client vertex in
/// `client_order`, gate on `h_v` before recursing into `para_match`. One
/// bad pair is logged and skipped rather than aborting the session (§7).
pub async fn compute_pi<B: Backend>(
    session: &mut Session,
    backend: &mut B,
    server_order: &[Uri],
    client_order: &[Uri],
) -> MatchMap {
    let mut pi = Vec::with_capacity(server_order.len());

    for u in server_order {
        session.reset_match_cache();
        let span = tracing::info_span!("driver_vertex", uri = %u);
        let _enter = span.enter();

        let mut matched = Vec::new();
        for v in client_order {
            let gate = match backend.h_v(session, u, v).await {
                Ok(gate) => gate,
                Err(err) => {
                    tracing::warn!(%u, %v, error = %err, "h_v failed, treating pair as unmatched");
                    continue;
                }
            };
            if !gate {
                continue;
            }
            match para_match(backend, session, u, v).await {
                Ok(true) => {
                    tracing::debug!(%u, %v, "matched");
                    matched.push(v.clone());
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(%u, %v, error = %err, "para_match failed, treating pair as unmatched");
                }
            }
        }
        pi.push((u.clone(), matched));
    }

    pi
}

/// The merge pass (§4.6 second half): order `pi` by descending server
/// out-degree, request each match's client lineage, merge it in, then
/// dedup. Mutates `server_graph` in place.
pub async fn merge_matches<L: LineageSource>(lineage: &mut L, server_graph: &mut Graph, mut pi: MatchMap) -> SessionReport {
    let before = server_graph.vertex_uris();
    let pairs_matched: usize = pi.iter().map(|(_, vs)| vs.len()).sum();

    pi.sort_by(|(a, _), (b, _)| {
        let degree_of = |uri: &Uri| server_graph.get_vertex(uri).map(|v| v.outward_degree).unwrap_or(0);
        degree_of(b).cmp(&degree_of(a))
    });

    for (u, matched_vs) in &pi {
        for v in matched_vs {
            let sub = match lineage.lineage(v).await {
                Ok(sub) => sub,
                Err(err) => {
                    tracing::warn!(%v, error = %err, "lineage request failed, skipping merge");
                    continue;
                }
            };
            if sub.get_vertex(v).is_none() {
                tracing::warn!(%v, "lineage subgraph missing its own root, skipping merge");
                continue;
            }
            merge_subgraph(&sub, v, server_graph, u);
        }
    }

    remove_duplicate_vertices_by_label_and_edge_label(server_graph);
    let vertices_merged = server_graph.newly_added_since(&before);
    tracing::info!(pairs_matched, vertices_merged, "session complete");

    SessionReport {
        pairs_matched,
        vertices_merged,
    }
}

/// Embeds and L2-normalizes every vertex label in `graph`, keyed by uri —
/// the shared first step of §4.2's `encode_embedding` for both sides of a
/// session.
fn embed_vertices(
    embedder: &dyn crate::embedding::Embedder,
    graph: &Graph,
) -> Result<std::collections::HashMap<Uri, Vec<f32>>, crate::error::ParaMatchError> {
    let pairs: Vec<(Uri, String)> = graph.vertices().iter().map(|v| (v.uri.clone(), v.label.clone())).collect();
    let raw = crate::embedding::encode_embedding(embedder, &pairs)?;
    Ok(raw
        .into_iter()
        .map(|(uri, vec)| (uri, crate::embedding::normalize(&vec)))
        .collect())
}

/// Runs a full session with both graphs and both embedders in one
/// process — the plaintext mirror variant (§4.7), used as the
/// ground-truth oracle for correctness tests and for the `--security-mode
/// plaintext` CLI path.
pub async fn run_plaintext_session(
    config: crate::session::Config,
    server_graph: &mut Graph,
    client_graph: &Graph,
    embedder: &dyn crate::embedding::Embedder,
    predictor: &dyn crate::predictor::Predictor,
) -> Result<SessionReport, crate::error::ParaMatchError> {
    let server_embeddings = embed_vertices(embedder, server_graph)?;
    let client_embeddings = embed_vertices(embedder, client_graph)?;
    let server_order: Vec<Uri> = server_graph.vertices().iter().map(|v| v.uri.clone()).collect();
    let client_order: Vec<Uri> = client_graph.vertices().iter().map(|v| v.uri.clone()).collect();

    let pi = {
        let mut backend = crate::backend::plaintext::PlaintextBackend {
            server_graph: &*server_graph,
            client_graph,
            server_embeddings: &server_embeddings,
            client_embeddings: &client_embeddings,
            embedder,
            predictor,
        };
        let mut session = Session::new(config);
        compute_pi(&mut session, &mut backend, &server_order, &client_order).await
    };

    let mut lineage = DirectLineageSource { client_graph };
    Ok(merge_matches(&mut lineage, server_graph, pi).await)
}

/// Runs a full encrypted session (§2, §4.3, §4.6) over an already-open
/// main session stream (carrying the one-time key-setup handshake) and
/// an already-open oracle stream (carrying message types 1-5, §6). Both
/// streams are generic so tests can drive this over an in-process
/// `tokio::io::duplex` pair instead of real sockets.
pub async fn run_encrypted_session<Main, OracleStream>(
    config: crate::session::Config,
    mut main_stream: Main,
    oracle_stream: OracleStream,
    server_graph: &mut Graph,
    embedder: &dyn crate::embedding::Embedder,
    predictor: &dyn crate::predictor::Predictor,
) -> Result<SessionReport, crate::error::ParaMatchError>
where
    Main: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
    OracleStream: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    let setup = crate::wire::read_key_setup(&mut main_stream).await?;
    let he = crate::embedding::HeContext::from_peer_bytes(setup.dimension as usize, &setup.server_key, &setup.public_key)?;

    let mut client_enc = std::collections::HashMap::with_capacity(setup.vertices.len());
    let mut client_order = Vec::with_capacity(setup.vertices.len());
    for (uri_str, bytes) in &setup.vertices {
        let uri = Uri::new(uri_str.clone());
        let enc = crate::embedding::deserialize(bytes)?;
        client_enc.insert(uri.clone(), enc);
        client_order.push(uri);
    }

    let server_plain = embed_vertices(embedder, server_graph)?;
    let mut server_enc = std::collections::HashMap::with_capacity(server_plain.len());
    for (uri, vec) in &server_plain {
        server_enc.insert(uri.clone(), he.encrypt(vec, false)?);
    }
    let server_order: Vec<Uri> = server_graph.vertices().iter().map(|v| v.uri.clone()).collect();

    let mut oracle = crate::oracle::TcpOracleClient::new(oracle_stream);

    let pi = {
        let mut backend = crate::backend::encrypted::EncryptedBackend {
            server_graph: &*server_graph,
            he: &he,
            server_enc: &server_enc,
            client_enc: &client_enc,
            predictor,
            embedder,
            oracle: &mut oracle,
        };
        let mut session = Session::new(config);
        compute_pi(&mut session, &mut backend, &server_order, &client_order).await
    };

    let report = {
        let mut lineage = OracleLineageSource { oracle: &mut oracle };
        merge_matches(&mut lineage, server_graph, pi).await
    };

    oracle.terminate().await?;
    Ok(report)
}

/// Runs a full *networked* session under the §4.7 plaintext mirror
/// variant (`--security-mode plaintext`, §6): the same key-setup
/// handshake and wire taxonomy as [`run_encrypted_session`], with
/// `EncVector` replaced by plain normalized vectors and no HE context —
/// `h_v`/`h_p` never leave the process, only top-k paths and lineage
/// requests go over the wire (`backend::networked_plaintext`).
pub async fn run_networked_plaintext_session<Main, OracleStream>(
    config: crate::session::Config,
    mut main_stream: Main,
    oracle_stream: OracleStream,
    server_graph: &mut Graph,
    embedder: &dyn crate::embedding::Embedder,
    predictor: &dyn crate::predictor::Predictor,
) -> Result<SessionReport, crate::error::ParaMatchError>
where
    Main: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
    OracleStream: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    let setup = crate::wire::read_key_setup(&mut main_stream).await?;

    let mut client_plain = std::collections::HashMap::with_capacity(setup.vertices.len());
    let mut client_order = Vec::with_capacity(setup.vertices.len());
    for (uri_str, bytes) in &setup.vertices {
        let uri = Uri::new(uri_str.clone());
        let vec: Vec<f32> = bincode::deserialize(bytes).map_err(crate::wire::WireError::from)?;
        client_plain.insert(uri.clone(), vec);
        client_order.push(uri);
    }

    let server_plain = embed_vertices(embedder, server_graph)?;
    let server_order: Vec<Uri> = server_graph.vertices().iter().map(|v| v.uri.clone()).collect();

    let mut oracle = crate::oracle::TcpOracleClient::new(oracle_stream);

    let pi = {
        let mut backend = crate::backend::networked_plaintext::NetworkedPlaintextBackend {
            server_graph: &*server_graph,
            server_embeddings: &server_plain,
            client_embeddings: &client_plain,
            predictor,
            embedder,
            oracle: &mut oracle,
        };
        let mut session = Session::new(config);
        compute_pi(&mut session, &mut backend, &server_order, &client_order).await
    };

    let report = {
        let mut lineage = OracleLineageSource { oracle: &mut oracle };
        merge_matches(&mut lineage, server_graph, pi).await
    };

    oracle.terminate().await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::plaintext::PlaintextBackend;
    use crate::embedding::{self, mock::MockEmbedder};
    use crate::graph::Vertex;
    use crate::predictor::mock::FirstCandidatePredictor;
    use crate::session::Config;
    use std::collections::HashMap;

    fn embed_all(embedder: &MockEmbedder, graph: &Graph) -> HashMap<Uri, Vec<f32>> {
        graph
            .vertices()
            .iter()
            .map(|v| (v.uri.clone(), embedding::normalize(&embedder.embed_one(&v.label).unwrap())))
            .collect()
    }

    fn ordered_uris(graph: &Graph) -> Vec<Uri> {
        graph.vertices().iter().map(|v| v.uri.clone()).collect()
    }

    /// §8 end-to-end scenario 1: leaf match, no merge since both sides
    /// are leaves.
    #[tokio::test]
    async fn leaf_match_scenario_produces_no_merge() {
        let mut server = Graph::new();
        server.add_vertex(Vertex::new("g1/a", "apple"));
        let mut client = Graph::new();
        client.add_vertex(Vertex::new("g2/a", "apple"));

        let embedder = MockEmbedder::new();
        let predictor = FirstCandidatePredictor;
        let server_emb = embed_all(&embedder, &server);
        let client_emb = embed_all(&embedder, &client);
        let server_order = ordered_uris(&server);
        let client_order = ordered_uris(&client);

        let mut session = Session::new(Config::default());
        let pi = {
            let mut backend = PlaintextBackend {
                server_graph: &server,
                client_graph: &client,
                server_embeddings: &server_emb,
                client_embeddings: &client_emb,
                embedder: &embedder,
                predictor: &predictor,
            };
            compute_pi(&mut session, &mut backend, &server_order, &client_order).await
        };
        assert_eq!(pi, vec![(Uri::new("g1/a"), vec![Uri::new("g2/a")])]);

        let mut lineage = crate::driver::DirectLineageSource { client_graph: &client };
        let report = merge_matches(&mut lineage, &mut server, pi).await;
        assert_eq!(report.pairs_matched, 1);
        assert_eq!(report.vertices_merged, 0);
        assert_eq!(server.vertices().len(), 1);
    }

    /// §8 end-to-end scenario 2: one-hop match merges the client's
    /// differently-labeled child in as a sibling.
    #[tokio::test]
    async fn one_hop_scenario_merges_sibling_child() {
        let mut server = Graph::new();
        server.add_vertex(Vertex::new("g1/apple", "apple"));
        server.add_vertex(Vertex::new("g1/worm", "worm"));
        server.add_edge(&Uri::new("g1/apple"), &Uri::new("g1/worm"), "eats").unwrap();

        let mut client = Graph::new();
        client.add_vertex(Vertex::new("g2/apple", "apple"));
        client.add_vertex(Vertex::new("g2/caterpillar", "caterpillar"));
        client
            .add_edge(&Uri::new("g2/apple"), &Uri::new("g2/caterpillar"), "eats")
            .unwrap();

        let embedder = MockEmbedder::new();
        let predictor = FirstCandidatePredictor;
        let server_emb = embed_all(&embedder, &server);
        let client_emb = embed_all(&embedder, &client);
        let server_order = ordered_uris(&server);
        let client_order = ordered_uris(&client);

        let config = Config {
            sigma: 0.0,
            delta: -1.0,
            ..Config::default()
        };
        let mut session = Session::new(config);
        let pi = {
            let mut backend = PlaintextBackend {
                server_graph: &server,
                client_graph: &client,
                server_embeddings: &server_emb,
                client_embeddings: &client_emb,
                embedder: &embedder,
                predictor: &predictor,
            };
            compute_pi(&mut session, &mut backend, &server_order, &client_order).await
        };

        let mut lineage = DirectLineageSource { client_graph: &client };
        let report = merge_matches(&mut lineage, &mut server, pi).await;
        assert!(report.vertices_merged >= 1);
        assert!(server.vertices().iter().any(|v| v.label == "caterpillar"));
        assert!(server.vertices().iter().any(|v| v.label == "worm"));
    }

    /// §8 end-to-end scenario 3: dissimilar roots, empty `PI`, no merge.
    #[tokio::test]
    async fn dissimilar_scenario_matches_nothing() {
        let mut server = Graph::new();
        server.add_vertex(Vertex::new("g1/a", "apple"));
        let client = {
            let mut g = Graph::new();
            g.add_vertex(Vertex::new("g2/c", "car"));
            g
        };

        let embedder = MockEmbedder::new();
        let predictor = FirstCandidatePredictor;
        let server_emb = embed_all(&embedder, &server);
        let client_emb = embed_all(&embedder, &client);
        let server_order = ordered_uris(&server);
        let client_order = ordered_uris(&client);

        let mut session = Session::new(Config::default());
        let pi = {
            let mut backend = PlaintextBackend {
                server_graph: &server,
                client_graph: &client,
                server_embeddings: &server_emb,
                client_embeddings: &client_emb,
                embedder: &embedder,
                predictor: &predictor,
            };
            compute_pi(&mut session, &mut backend, &server_order, &client_order).await
        };
        assert_eq!(pi, vec![(Uri::new("g1/a"), Vec::new())]);

        let before_vertices = server.vertices().len();
        let mut lineage = DirectLineageSource { client_graph: &client };
        let report = merge_matches(&mut lineage, &mut server, pi).await;
        assert_eq!(report.pairs_matched, 0);
        assert_eq!(server.vertices().len(), before_vertices);
    }
}
