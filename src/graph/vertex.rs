use super::entity::Uri;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A vertex in a [`crate::graph::Graph`].
///
/// Equality and hashing are by `uri` only, matching the original
/// `Vertex.__eq__`/`__hash__` pair — two vertices with the same URI but
/// different labels are considered the same vertex, which callers rely on
/// when reusing vertices across merge operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub uri: Uri,
    pub label: String,
    /// Count of outgoing edges in the owning graph. Kept in sync by
    /// [`crate::graph::Graph::add_edge`]/[`crate::graph::Graph::remove_edge`];
    /// never updated directly.
    pub outward_degree: u32,
    /// Carried over from the original model; unused by the match engine.
    pub status: bool,
}

impl Vertex {
    pub fn new(uri: impl Into<Uri>, label: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            label: label.into(),
            outward_degree: 0,
            status: false,
        }
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_label() {
        let a = Vertex::new("g1/a", "apple");
        let b = Vertex::new("g1/a", "different-label");
        assert_eq!(a, b);
    }

    #[test]
    fn new_vertex_starts_with_zero_degree() {
        let v = Vertex::new("g1/a", "apple");
        assert_eq!(v.outward_degree, 0);
        assert!(!v.status);
    }
}
