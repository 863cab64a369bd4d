//! Stable identifiers shared by vertices and edges.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable, globally-unique identifier for a vertex or an edge.
///
/// Vertex URIs are plain strings (e.g. `"g1/apple"`); edge URIs are
/// synthesized as `"{source}->{target}"` and therefore always contain
/// `"->"`. [`Uri::is_edge`] is how [`crate::graph::Graph::lookup`]
/// distinguishes the two without a type tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uri(String);

impl Uri {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_edge(&self) -> bool {
        self.0.contains("->")
    }

    /// Synthesizes the URI of an edge from its endpoints, matching the
    /// original `f"{v1.uri}->{v2.uri}"` construction.
    pub fn edge(source: &Uri, target: &Uri) -> Self {
        Self(format!("{}->{}", source.0, target.0))
    }

    pub fn prefixed(&self, prefix: &str) -> Self {
        Self(format!("{prefix}/{}", self.0))
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Uri {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Uri {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_uri_is_synthesized_from_endpoints() {
        let a = Uri::new("g1/apple");
        let b = Uri::new("g1/worm");
        let e = Uri::edge(&a, &b);
        assert_eq!(e.as_str(), "g1/apple->g1/worm");
        assert!(e.is_edge());
        assert!(!a.is_edge());
    }

    #[test]
    fn prefixing_matches_dataset_loader_convention() {
        let raw = Uri::new("apple");
        assert_eq!(raw.prefixed("g1").as_str(), "g1/apple");
    }
}
