//! The seam `para_match` is written against (§4.5), generalized over the
//! encrypted and plaintext variants (§4.3, §4.7).
//!
//! Both variants need exactly the same four primitives — "are these two
//! vertices similar", "what are this vertex's top-k paraphrase paths (mine
//! and the peer's)", and "how similar are two paths" — differing only in
//! whether answering them means a masked oracle round-trip or a local dot
//! product. [`Backend`] captures that seam once so `para_match` (§4.5) is
//! written a single time and driven by either implementation.

pub mod encrypted;
pub mod networked_plaintext;
pub mod plaintext;

use crate::error::MatchError;
use crate::graph::Uri;
use crate::session::Session;
use async_trait::async_trait;

/// One candidate paraphrase path, from either party's `h_r`/oracle
/// top-k (§4.4): the vertex one hop from the root (what `para_match`
/// recurses on) paired with an opaque representation `h_p` can score.
#[derive(Clone)]
pub struct PathCandidate<P> {
    pub next_vertex: Uri,
    pub repr: P,
}

/// The similarity-and-path-generation seam `para_match` is built against.
/// `Repr` is the backend's own path representation — an encrypted path
/// embedding + length ciphertext pair for [`encrypted::EncryptedBackend`],
/// a plain vector + integer length for [`plaintext::PlaintextBackend`].
#[async_trait]
pub trait Backend: Send {
    type Repr: Clone + Send + Sync;

    /// `h_v(a, b)` (§4.3): is the cosine similarity of the embeddings at
    /// server-side uri `a` and client-side uri `b` at least `sigma`?
    async fn h_v(&mut self, session: &mut Session, a: &Uri, b: &Uri) -> Result<bool, MatchError>;

    /// `h_p(p1, p2)` (§4.3): a ranking-only score for the similarity of
    /// two paraphrase paths. Never an absolute cosine (§4.3, §9).
    async fn h_p(&mut self, session: &mut Session, a: &Self::Repr, b: &Self::Repr) -> Result<f64, MatchError>;

    /// Server-side top-k paraphrase paths rooted at `root`, computed
    /// locally via `h_r` (§4.4).
    async fn server_paths(&mut self, session: &mut Session, root: &Uri) -> Vec<PathCandidate<Self::Repr>>;

    /// Client-side top-k paraphrase paths rooted at `root`. For the
    /// encrypted backend this is message type 2 (§6); for the plaintext
    /// backend, direct local access to the ground-truth client graph.
    async fn client_paths(&mut self, session: &mut Session, root: &Uri) -> Result<Vec<PathCandidate<Self::Repr>>, MatchError>;

    /// Whether the server vertex `uri` is a leaf (§4.5 step 2 — only the
    /// server side is checked; see the design notes on directionality).
    fn is_server_leaf(&self, uri: &Uri) -> bool;
}
