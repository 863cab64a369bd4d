//! ParaMatch: a privacy-preserving graph enrichment protocol between a
//! server and a client, each holding a labeled directed graph.
//!
//! The two parties discover semantically similar vertex pairs across their
//! graphs — without either learning the other's plaintext labels — and use
//! the matches to merge selected subgraphs from the peer into the local
//! graph. See `SPEC_FULL.md` for the full protocol description.
//!
//! # Example
//!
//! ```
//! use paramatch::graph::Graph;
//!
//! let graph = Graph::new();
//! assert_eq!(graph.len_vertices(), 0);
//! ```

pub mod backend;
pub mod driver;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod oracle;
pub mod para_match;
pub mod paths;
pub mod predictor;
pub mod session;
pub mod wire;

pub use error::{ParaMatchError, ParaMatchResult};
pub use session::{Config, SecurityMode, Session};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
