//! The decryption-oracle protocol (§4.3, §4.6, §6): S's view of the wire
//! taxonomy ([`OracleClient`]) and the synchronous dispatch loop C runs to
//! answer it ([`serve_connection`]).

use crate::embedding::{self, EncVector, HeContext};
use crate::error::MatchError;
use crate::graph::{append_subgraph_at_uri, merge_graphs, Graph, Uri};
use crate::predictor::Predictor;
use crate::session::{random_mask, Config};
use crate::wire::{
    self, read_message, write_message, write_terminate, EnrichmentPush, Envelope, MessageType,
    TopKReply, TopKRequest,
};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// `h_v`'s masked scalar (§4.3) is scaled by `FIXED_POINT_SCALE^2` from the
/// dot product and by another `FIXED_POINT_SCALE` from the `* mask`
/// plaintext multiply.
const VERTEX_SCALAR_POWERS: i32 = 3;

/// `h_p`'s masked scalar carries one extra `FIXED_POINT_SCALE` factor over
/// `h_v`'s: the dot product (`SCALE^2`), multiplied by the already-scaled
/// `(len1+len2)` ciphertext (`SCALE`), multiplied by the plaintext
/// `0.25*mask` factor (`SCALE`) — `SCALE^4` total.
const PATH_SCALAR_POWERS: i32 = 4;

/// S's side of the oracle RPC taxonomy (§6, message types 1-5). A trait so
/// `para_match`/`backend::encrypted` can be driven by a real [`TcpOracleClient`]
/// in production and an in-process loopback in tests.
#[async_trait]
pub trait OracleClient: Send {
    async fn vertex_similarity(&mut self, masked: &EncVector) -> Result<bool, MatchError>;
    async fn path_similarity(&mut self, masked: &EncVector) -> Result<f64, MatchError>;
    async fn top_k_paths(&mut self, vertex_uri: &Uri, k: u32) -> Result<TopKReply, MatchError>;
    async fn lineage(&mut self, client_uri: &Uri) -> Result<Graph, MatchError>;
    async fn enrichment(&mut self, uri: &Uri, subgraph: &Graph) -> Result<(), MatchError>;
    async fn terminate(&mut self) -> Result<(), MatchError>;
}

/// A live connection to C's decryption-oracle server (`host:port+10`, §6).
pub struct TcpOracleClient<S> {
    stream: S,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> TcpOracleClient<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Unpin + Send> OracleClient for TcpOracleClient<S> {
    async fn vertex_similarity(&mut self, masked: &EncVector) -> Result<bool, MatchError> {
        let payload = embedding::serialize(masked)?;
        write_message(&mut self.stream, MessageType::VertexSimilarity, &payload).await?;
        let reply = self.stream.read_u32().await.map_err(|e| MatchError::Wire(e.into()))?;
        Ok(reply != 0)
    }

    async fn path_similarity(&mut self, masked: &EncVector) -> Result<f64, MatchError> {
        let payload = embedding::serialize(masked)?;
        write_message(&mut self.stream, MessageType::PathSimilarity, &payload).await?;
        let mut buf = [0u8; 8];
        self.stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| MatchError::Wire(e.into()))?;
        Ok(f64::from_be_bytes(buf))
    }

    async fn top_k_paths(&mut self, vertex_uri: &Uri, k: u32) -> Result<TopKReply, MatchError> {
        let request = TopKRequest {
            vertex_uri: vertex_uri.to_string(),
            k,
        };
        let payload = wire::encode(&request)?;
        write_message(&mut self.stream, MessageType::TopKPaths, &payload).await?;
        match read_message(&mut self.stream).await? {
            Envelope::Message { payload, .. } => Ok(wire::decode(&payload)?),
            Envelope::Terminate => Err(MatchError::OracleUnavailable(
                "peer closed during top-k request".into(),
            )),
        }
    }

    async fn lineage(&mut self, client_uri: &Uri) -> Result<Graph, MatchError> {
        write_message(
            &mut self.stream,
            MessageType::LineageRequest,
            client_uri.as_str().as_bytes(),
        )
        .await?;
        match read_message(&mut self.stream).await? {
            Envelope::Message { payload, .. } => {
                let mut graph: Graph = bincode::deserialize(&payload).map_err(|e| MatchError::Wire(e.into()))?;
                graph.reindex();
                Ok(graph)
            }
            Envelope::Terminate => Err(MatchError::OracleUnavailable(
                "peer closed during lineage request".into(),
            )),
        }
    }

    async fn enrichment(&mut self, uri: &Uri, subgraph: &Graph) -> Result<(), MatchError> {
        let push = EnrichmentPush {
            uri: uri.to_string(),
            subgraph: bincode::serialize(subgraph).map_err(|e| MatchError::Wire(e.into()))?,
        };
        let payload = wire::encode(&push)?;
        write_message(&mut self.stream, MessageType::Enrichment, &payload).await?;
        Ok(())
    }

    async fn terminate(&mut self) -> Result<(), MatchError> {
        write_terminate(&mut self.stream).await?;
        Ok(())
    }
}

/// Everything C's oracle handler needs to answer a session's requests.
/// `client_graph` is mutated in place by type-5 enrichment pushes (§4.6).
pub struct OracleState<'a> {
    pub he: &'a HeContext,
    pub client_graph: &'a mut Graph,
    pub client_embeddings: &'a std::collections::HashMap<Uri, EncVector>,
    pub predictor: &'a dyn Predictor,
    pub embedder: &'a dyn embedding::Embedder,
    pub config: Config,
}

/// C's single-connection, synchronous dispatch loop (§4.6). Runs until the
/// peer sends the termination sentinel or the connection drops.
pub async fn serve_connection<S: AsyncRead + AsyncWrite + Unpin>(
    mut stream: S,
    state: &mut OracleState<'_>,
) -> Result<(), MatchError> {
    loop {
        match read_message(&mut stream).await? {
            Envelope::Terminate => {
                tracing::info!("oracle: session terminated by peer");
                return Ok(());
            }
            Envelope::Message { kind, payload } => match kind {
                MessageType::VertexSimilarity => {
                    let masked: EncVector = embedding::deserialize(&payload)?;
                    let s = state.he.decrypt_scalar(&masked, VERTEX_SCALAR_POWERS);
                    let reply: u32 = if s >= -state.config.epsilon { 1 } else { 0 };
                    stream.write_u32(reply).await.map_err(|e| MatchError::Wire(e.into()))?;
                    stream.flush().await.map_err(|e| MatchError::Wire(e.into()))?;
                    tracing::debug!(s, reply, "oracle: h_v round trip");
                }
                MessageType::PathSimilarity => {
                    let masked: EncVector = embedding::deserialize(&payload)?;
                    let s = state.he.decrypt_scalar(&masked, PATH_SCALAR_POWERS);
                    let oracle_mask = random_mask(1.0, 2.0, false);
                    let blinded = s.signum() * s.abs() * oracle_mask;
                    stream
                        .write_all(&blinded.to_be_bytes())
                        .await
                        .map_err(|e| MatchError::Wire(e.into()))?;
                    stream.flush().await.map_err(|e| MatchError::Wire(e.into()))?;
                    tracing::debug!(s, blinded, "oracle: h_p round trip");
                }
                MessageType::TopKPaths => {
                    let request: TopKRequest = wire::decode(&payload)?;
                    let reply = answer_top_k(state, &request)?;
                    let encoded = wire::encode(&reply)?;
                    write_message(&mut stream, MessageType::TopKPaths, &encoded).await?;
                }
                MessageType::LineageRequest => {
                    let uri_str = String::from_utf8_lossy(&payload).to_string();
                    let lineage = state.client_graph.extract_lineage_set(&Uri::new(uri_str));
                    let encoded = bincode::serialize(&lineage).map_err(|e| MatchError::Wire(e.into()))?;
                    write_message(&mut stream, MessageType::LineageRequest, &encoded).await?;
                }
                MessageType::Enrichment => {
                    let push: EnrichmentPush = wire::decode(&payload)?;
                    let mut subgraph: Graph =
                        bincode::deserialize(&push.subgraph).map_err(|e| MatchError::Wire(e.into()))?;
                    subgraph.reindex();
                    let merged = merge_graphs(state.client_graph, &subgraph);
                    *state.client_graph = merged;
                    append_subgraph_at_uri(state.client_graph, &subgraph, &Uri::new(push.uri));
                }
            },
        }
    }
}

fn answer_top_k(state: &mut OracleState<'_>, request: &TopKRequest) -> Result<TopKReply, MatchError> {
    let root = Uri::new(request.vertex_uri.clone());
    let paths = crate::paths::h_r(state.client_graph, state.predictor, &root, request.k as usize);

    let mut uris = Vec::with_capacity(paths.len());
    let mut vectors = Vec::with_capacity(paths.len());
    let mut edges = Vec::with_capacity(paths.len());
    let mut length = Vec::with_capacity(paths.len());

    for path in &paths {
        let Some(next) = path.next_vertex() else {
            continue;
        };
        let Some(next_ct) = state.client_embeddings.get(next) else {
            continue;
        };
        let edge_refs: Vec<&crate::graph::Edge> = path.edges.iter().collect();
        let sentence_embedding = embedding::encode_path(state.embedder, &edge_refs)
            .map_err(|e| MatchError::OracleUnavailable(e.to_string()))?;
        let path_ct = state.he.encrypt(&sentence_embedding, true)?;
        let len_ct = state.he.encrypt_scalar(1.0 / path.len().max(1) as f64)?;

        uris.push(next.to_string());
        vectors.push(embedding::serialize(next_ct)?);
        edges.push(embedding::serialize(&path_ct)?);
        length.push(embedding::serialize(&len_ct)?);
    }

    Ok(TopKReply {
        uris,
        vectors,
        edges,
        length,
    })
}

/// Everything C's oracle handler needs for a networked *plaintext*
/// session (§4.7 carried over the wire, `--security-mode plaintext`):
/// no secret key, no masking — `client_embeddings` holds plain
/// normalized vectors instead of ciphertexts, and `h_v`/`h_p` are never
/// asked of this handler at all (S computes them locally against the
/// plain map it received at key setup). Only the type-2/4/5 requests
/// reach this dispatch loop.
pub struct PlainOracleState<'a> {
    pub client_graph: &'a mut Graph,
    pub predictor: &'a dyn Predictor,
    pub embedder: &'a dyn embedding::Embedder,
    pub config: Config,
}

/// C's dispatch loop for a networked plaintext session. Structurally the
/// same loop as [`serve_connection`], minus the HE-backed `h_v`/`h_p`
/// handling: a well-behaved plaintext session never sends message types
/// 1 or 3 (§4.7's whole point is that those become local computations),
/// so those arms reply with a harmless default rather than treating an
/// unexpected one as a reason to abort the session.
pub async fn serve_plaintext_connection<S: AsyncRead + AsyncWrite + Unpin>(
    mut stream: S,
    state: &mut PlainOracleState<'_>,
) -> Result<(), MatchError> {
    loop {
        match read_message(&mut stream).await? {
            Envelope::Terminate => {
                tracing::info!("oracle: plaintext session terminated by peer");
                return Ok(());
            }
            Envelope::Message { kind, payload } => match kind {
                MessageType::VertexSimilarity => {
                    tracing::warn!("oracle: unexpected type-1 message in a plaintext session, ignoring");
                    stream.write_u32(0).await.map_err(|e| MatchError::Wire(e.into()))?;
                    stream.flush().await.map_err(|e| MatchError::Wire(e.into()))?;
                }
                MessageType::PathSimilarity => {
                    tracing::warn!("oracle: unexpected type-3 message in a plaintext session, ignoring");
                    stream
                        .write_all(&0.0_f64.to_be_bytes())
                        .await
                        .map_err(|e| MatchError::Wire(e.into()))?;
                    stream.flush().await.map_err(|e| MatchError::Wire(e.into()))?;
                }
                MessageType::TopKPaths => {
                    let request: TopKRequest = wire::decode(&payload)?;
                    let reply = answer_top_k_plain(state, &request)?;
                    let encoded = wire::encode(&reply)?;
                    write_message(&mut stream, MessageType::TopKPaths, &encoded).await?;
                }
                MessageType::LineageRequest => {
                    let uri_str = String::from_utf8_lossy(&payload).to_string();
                    let lineage = state.client_graph.extract_lineage_set(&Uri::new(uri_str));
                    let encoded = bincode::serialize(&lineage).map_err(|e| MatchError::Wire(e.into()))?;
                    write_message(&mut stream, MessageType::LineageRequest, &encoded).await?;
                }
                MessageType::Enrichment => {
                    let push: EnrichmentPush = wire::decode(&payload)?;
                    let mut subgraph: Graph =
                        bincode::deserialize(&push.subgraph).map_err(|e| MatchError::Wire(e.into()))?;
                    subgraph.reindex();
                    let merged = merge_graphs(state.client_graph, &subgraph);
                    *state.client_graph = merged;
                    append_subgraph_at_uri(state.client_graph, &subgraph, &Uri::new(push.uri));
                }
            },
        }
    }
}

/// Plaintext counterpart to [`answer_top_k`]: the same local `h_r` call,
/// but the path embedding and length are serialized as plain values
/// (normalized `Vec<f32>`, integer `|path|` per §4.7) instead of
/// ciphertexts. `vectors` is left populated for wire-shape parity with
/// the encrypted reply even though neither backend currently reads it
/// back out of a `TopKReply`.
fn answer_top_k_plain(state: &mut PlainOracleState<'_>, request: &TopKRequest) -> Result<TopKReply, MatchError> {
    let root = Uri::new(request.vertex_uri.clone());
    let paths = crate::paths::h_r(state.client_graph, state.predictor, &root, request.k as usize);

    let mut uris = Vec::with_capacity(paths.len());
    let mut vectors = Vec::with_capacity(paths.len());
    let mut edges = Vec::with_capacity(paths.len());
    let mut length = Vec::with_capacity(paths.len());

    for path in &paths {
        let Some(next) = path.next_vertex() else {
            continue;
        };
        let edge_refs: Vec<&crate::graph::Edge> = path.edges.iter().collect();
        let sentence_embedding = embedding::encode_path(state.embedder, &edge_refs)
            .map_err(|e| MatchError::OracleUnavailable(e.to_string()))?;
        let normalized = embedding::normalize(&sentence_embedding);

        uris.push(next.to_string());
        vectors.push(bincode::serialize(&normalized).map_err(|e| MatchError::Wire(e.into()))?);
        edges.push(bincode::serialize(&normalized).map_err(|e| MatchError::Wire(e.into()))?);
        length.push(bincode::serialize(&(path.len() as f64)).map_err(|e| MatchError::Wire(e.into()))?);
    }

    Ok(TopKReply {
        uris,
        vectors,
        edges,
        length,
    })
}
