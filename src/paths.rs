//! Top-k paraphrase path generator `h_r` (§4.4).

use crate::graph::{Edge, Graph, Uri};
use crate::predictor::Predictor;

#[derive(Debug, Clone)]
pub struct GeneratedPath {
    /// Vertices visited, starting at the root.
    pub vertices: Vec<Uri>,
    /// Edges taken, aligned with `vertices` (`edges[i]` connects
    /// `vertices[i]` to `vertices[i+1]`).
    pub edges: Vec<Edge>,
    /// `r_p(p)`: product of per-step branching probabilities.
    pub score: f64,
}

impl GeneratedPath {
    /// The vertex one hop from the root — what §4.5 calls the path's
    /// "next vertex", the value `para_match` actually recurses on.
    pub fn next_vertex(&self) -> Option<&Uri> {
        self.vertices.get(1)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Walks `graph` outward from `root`, guided by `predictor`, and returns
/// up to `k` highest-scoring paraphrase paths.
///
/// Candidate-matching is *first-match-wins with explicit stop* — the
/// specification's resolution of the "does the source `break`?" open
/// question (§9): the first candidate edge whose label the predictor
/// accepts is taken, and the search for more candidates at that step
/// ends immediately.
pub fn h_r(graph: &Graph, predictor: &dyn Predictor, root: &Uri, k: usize) -> Vec<GeneratedPath> {
    if k == 0 {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    for first_edge in graph.get_edges(root) {
        if let Some(path) = walk_from(graph, predictor, root, first_edge) {
            candidates.push(path);
        }
    }

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    candidates.truncate(k);
    candidates
}

fn walk_from(graph: &Graph, predictor: &dyn Predictor, root: &Uri, first_edge: &Edge) -> Option<GeneratedPath> {
    let mut vertices = vec![root.clone(), first_edge.target.clone()];
    let mut edges = vec![first_edge.clone()];
    let mut cursor = first_edge.clone();

    loop {
        if graph.is_leaf(&cursor.target) {
            break;
        }
        let candidate_edges = graph.get_edges(&cursor.target);
        if candidate_edges.is_empty() {
            break;
        }
        let candidate_labels: Vec<String> = candidate_edges.iter().map(|e| e.label.clone()).collect();
        let prediction = predictor.predict(&cursor.label, &candidate_labels);

        let chosen = candidate_edges.iter().find(|c| prediction.matches(&c.label));
        let Some(chosen) = chosen else {
            break;
        };

        if vertices.contains(&chosen.target) {
            break;
        }

        vertices.push(chosen.target.clone());
        edges.push((*chosen).clone());
        cursor = (*chosen).clone();
    }

    let score = r_p(graph, &vertices);
    Some(GeneratedPath { vertices, edges, score })
}

/// `r_p(p) = Π 1/p[i].outward_degree` over each non-final vertex in the
/// path, treating outgoing edges as uniformly distributed.
fn r_p(graph: &Graph, vertices: &[Uri]) -> f64 {
    vertices[..vertices.len().saturating_sub(1)]
        .iter()
        .map(|uri| {
            let degree = graph.get_vertex(uri).map(|v| v.outward_degree).unwrap_or(1).max(1);
            1.0 / degree as f64
        })
        .product()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Vertex;
    use crate::predictor::mock::FirstCandidatePredictor;

    fn chain_graph() -> Graph {
        let mut g = Graph::new();
        g.add_vertex(Vertex::new("g1/a", "a"));
        g.add_vertex(Vertex::new("g1/b", "b"));
        g.add_vertex(Vertex::new("g1/c", "c"));
        g.add_edge(&Uri::new("g1/a"), &Uri::new("g1/b"), "r").unwrap();
        g.add_edge(&Uri::new("g1/b"), &Uri::new("g1/c"), "r").unwrap();
        g
    }

    #[test]
    fn single_vertex_graph_returns_no_paths() {
        let mut g = Graph::new();
        g.add_vertex(Vertex::new("g1/a", "a"));
        let predictor = FirstCandidatePredictor;
        let paths = h_r(&g, &predictor, &Uri::new("g1/a"), 3);
        assert!(paths.is_empty());
    }

    #[test]
    fn k_zero_returns_empty() {
        let g = chain_graph();
        let predictor = FirstCandidatePredictor;
        assert!(h_r(&g, &predictor, &Uri::new("g1/a"), 0).is_empty());
    }

    #[test]
    fn cycle_breaks_and_terminates() {
        let mut g = Graph::new();
        g.add_vertex(Vertex::new("g1/a", "a"));
        g.add_vertex(Vertex::new("g1/b", "b"));
        g.add_edge(&Uri::new("g1/a"), &Uri::new("g1/b"), "r").unwrap();
        g.add_edge(&Uri::new("g1/b"), &Uri::new("g1/a"), "r").unwrap();

        let predictor = FirstCandidatePredictor;
        let paths = h_r(&g, &predictor, &Uri::new("g1/a"), 3);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].vertices.len(), 2);
        assert!((paths[0].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn chain_path_extends_through_predictor_matches() {
        let g = chain_graph();
        let predictor = FirstCandidatePredictor;
        let paths = h_r(&g, &predictor, &Uri::new("g1/a"), 3);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].vertices.last().unwrap(), &Uri::new("g1/c"));
    }
}
