//! Top-level error type aggregating every layer's errors (§7).

use crate::embedding::{EmbeddingError, HeError};
use crate::graph::{DatasetError, GraphError};
use crate::wire::WireError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParaMatchError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    He(#[from] HeError),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("oracle unavailable: {0}")]
    OracleUnavailable(String),
    #[error("{0}")]
    Other(String),
}

pub type ParaMatchResult<T> = Result<T, ParaMatchError>;

/// Errors encountered while matching a single vertex pair. Per §7, these
/// are always logged and swallowed at the driver-loop boundary — one bad
/// pair must not abort the session — so `para_match` returns `false`
/// rather than propagating this type; it exists to give callers a typed
/// reason to log.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    He(#[from] HeError),
    #[error("oracle unavailable: {0}")]
    OracleUnavailable(String),
    #[error("lookup miss for uri {0}")]
    LookupMiss(String),
}
