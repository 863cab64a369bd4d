use super::entity::Uri;
use serde::{Deserialize, Serialize};

/// A directed, labeled edge `source -> target`.
///
/// `uri` is synthesized, not supplied by the caller; equality is by `uri`,
/// so two edges between the same ordered pair collapse to one logical
/// identity even if added with different labels (see the design notes on
/// parallel edges).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub uri: Uri,
    pub source: Uri,
    pub target: Uri,
    pub label: String,
}

impl Edge {
    pub fn new(source: Uri, target: Uri, label: impl Into<String>) -> Self {
        let uri = Uri::edge(&source, &target);
        Self {
            uri,
            source,
            target,
            label: label.into(),
        }
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Edge {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_is_synthesized_from_endpoints() {
        let e = Edge::new(Uri::new("g1/a"), Uri::new("g1/b"), "eats");
        assert_eq!(e.uri.as_str(), "g1/a->g1/b");
    }

    #[test]
    fn equality_is_by_uri_not_label() {
        let a = Edge::new(Uri::new("g1/a"), Uri::new("g1/b"), "eats");
        let b = Edge::new(Uri::new("g1/a"), Uri::new("g1/b"), "avoids");
        assert_eq!(a, b);
    }
}
