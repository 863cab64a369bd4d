use super::edge::Edge;
use super::entity::Uri;
use super::vertex::Vertex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("vertex not found: {0}")]
    VertexNotFound(Uri),
    #[error("edge not found: {0} -> {1}")]
    EdgeNotFound(Uri, Uri),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Result of [`Graph::lookup`] — the original distinguishes edge from
/// vertex URIs by the presence of `"->"`; this makes that distinction a
/// type instead of a runtime string check at every call site.
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    Vertex(&'a Vertex),
    Edge(&'a Edge),
}

/// An ordered, insertion-preserving directed labeled graph.
///
/// Vertices and edges are kept in `Vec`s (insertion order matters for
/// `get_edges` and for the driver's pair-iteration order) with a side
/// index for O(1) lookup by URI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    #[serde(skip)]
    vertex_index: HashMap<Uri, usize>,
    #[serde(skip)]
    edge_index: HashMap<Uri, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the URI indices after deserialization, since `#[serde(skip)]`
    /// fields come back empty.
    pub fn reindex(&mut self) {
        self.vertex_index = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (v.uri.clone(), i))
            .collect();
        self.edge_index = self
            .edges
            .iter()
            .enumerate()
            .map(|(i, e)| (e.uri.clone(), i))
            .collect();
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn add_vertex(&mut self, vertex: Vertex) -> Uri {
        let uri = vertex.uri.clone();
        if let Some(&idx) = self.vertex_index.get(&uri) {
            self.vertices[idx] = vertex;
            return uri;
        }
        self.vertex_index.insert(uri.clone(), self.vertices.len());
        self.vertices.push(vertex);
        uri
    }

    pub fn remove_vertex(&mut self, uri: &Uri) {
        if let Some(idx) = self.vertex_index.remove(uri) {
            self.vertices.remove(idx);
            self.edges
                .retain(|e| &e.source != uri && &e.target != uri);
            self.reindex();
        }
    }

    pub fn add_edge(&mut self, source: &Uri, target: &Uri, label: impl Into<String>) -> GraphResult<Uri> {
        let source_idx = *self
            .vertex_index
            .get(source)
            .ok_or_else(|| GraphError::VertexNotFound(source.clone()))?;
        let edge = Edge::new(source.clone(), target.clone(), label);
        let uri = edge.uri.clone();
        self.edge_index.insert(uri.clone(), self.edges.len());
        self.edges.push(edge);
        self.vertices[source_idx].outward_degree += 1;
        Ok(uri)
    }

    pub fn remove_edge(&mut self, source: &Uri, target: &Uri) {
        let before = self.edges.len();
        self.edges
            .retain(|e| !(&e.source == source && &e.target == target));
        let removed = before - self.edges.len();
        if removed > 0 {
            if let Some(&idx) = self.vertex_index.get(source) {
                self.vertices[idx].outward_degree =
                    self.vertices[idx].outward_degree.saturating_sub(removed as u32);
            }
            self.reindex();
        }
    }

    pub fn get_vertex(&self, uri: &Uri) -> Option<&Vertex> {
        self.vertex_index.get(uri).map(|&i| &self.vertices[i])
    }

    pub fn get_edge(&self, uri: &Uri) -> Option<&Edge> {
        self.edge_index.get(uri).map(|&i| &self.edges[i])
    }

    pub fn lookup(&self, uri: &Uri) -> Option<Lookup<'_>> {
        if uri.is_edge() {
            self.get_edge(uri).map(Lookup::Edge)
        } else {
            self.get_vertex(uri).map(Lookup::Vertex)
        }
    }

    pub fn is_leaf(&self, uri: &Uri) -> bool {
        self.get_vertex(uri).map(|v| v.outward_degree == 0).unwrap_or(true)
    }

    /// Outgoing edges of `v`, in insertion order.
    pub fn get_edges(&self, v: &Uri) -> Vec<&Edge> {
        self.edges.iter().filter(|e| &e.source == v).collect()
    }

    pub fn neighbors(&self, v: &Uri) -> Vec<&Vertex> {
        self.get_edges(v)
            .into_iter()
            .filter_map(|e| self.get_vertex(&e.target))
            .collect()
    }

    /// DFS-reachable subgraph rooted at `v`, including `v` itself and every
    /// vertex/edge reachable by outgoing edges. Converted to an explicit
    /// stack per the design notes, since source graphs are not bounded in
    /// depth.
    pub fn extract_lineage_set(&self, v: &Uri) -> Graph {
        let mut lineage = Graph::new();
        let mut visited: HashSet<Uri> = HashSet::new();
        let mut stack = vec![v.clone()];

        if let Some(root) = self.get_vertex(v) {
            lineage.add_vertex(root.clone());
        }

        while let Some(current) = stack.pop() {
            if visited.contains(&current) {
                continue;
            }
            visited.insert(current.clone());

            for edge in self.get_edges(&current) {
                let next = edge.target.clone();
                if let Some(next_vertex) = self.get_vertex(&next) {
                    lineage.add_vertex(next_vertex.clone());
                }
                let _ = lineage.add_edge(&current, &next, edge.label.clone());
                if !visited.contains(&next) {
                    stack.push(next);
                }
            }
        }

        lineage
    }

    /// Diagnostic count used by the driver to report merge-phase growth:
    /// how many of this graph's current vertices were not present in
    /// `before`.
    pub fn newly_added_since(&self, before: &HashSet<Uri>) -> usize {
        self.vertices
            .iter()
            .filter(|v| !before.contains(&v.uri))
            .count()
    }

    pub fn vertex_uris(&self) -> HashSet<Uri> {
        self.vertices.iter().map(|v| v.uri.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Graph {
        let mut g = Graph::new();
        g.add_vertex(Vertex::new("g1/apple", "apple"));
        g.add_vertex(Vertex::new("g1/worm", "worm"));
        g.add_vertex(Vertex::new("g1/leaf", "leaf"));
        g.add_edge(&Uri::new("g1/apple"), &Uri::new("g1/worm"), "eats").unwrap();
        g.add_edge(&Uri::new("g1/worm"), &Uri::new("g1/leaf"), "eats").unwrap();
        g
    }

    #[test]
    fn outward_degree_tracks_edges() {
        let g = sample();
        assert_eq!(g.get_vertex(&Uri::new("g1/apple")).unwrap().outward_degree, 1);
        assert_eq!(g.get_vertex(&Uri::new("g1/leaf")).unwrap().outward_degree, 0);
    }

    #[test]
    fn lookup_distinguishes_edges_from_vertices() {
        let g = sample();
        match g.lookup(&Uri::new("g1/apple->g1/worm")) {
            Some(Lookup::Edge(e)) => assert_eq!(e.label, "eats"),
            _ => panic!("expected edge"),
        }
        match g.lookup(&Uri::new("g1/apple")) {
            Some(Lookup::Vertex(v)) => assert_eq!(v.label, "apple"),
            _ => panic!("expected vertex"),
        }
    }

    #[test]
    fn lineage_set_contains_root_and_is_closed_under_outgoing_edges() {
        let g = sample();
        let lineage = g.extract_lineage_set(&Uri::new("g1/apple"));
        assert!(lineage.get_vertex(&Uri::new("g1/apple")).is_some());
        assert!(lineage.get_vertex(&Uri::new("g1/worm")).is_some());
        assert!(lineage.get_vertex(&Uri::new("g1/leaf")).is_some());
        assert_eq!(lineage.edges().len(), 2);
    }

    #[test]
    fn lineage_set_terminates_on_cycles() {
        let mut g = Graph::new();
        g.add_vertex(Vertex::new("g1/a", "a"));
        g.add_vertex(Vertex::new("g1/b", "b"));
        g.add_edge(&Uri::new("g1/a"), &Uri::new("g1/b"), "r").unwrap();
        g.add_edge(&Uri::new("g1/b"), &Uri::new("g1/a"), "r").unwrap();

        let lineage = g.extract_lineage_set(&Uri::new("g1/a"));
        assert_eq!(lineage.vertices().len(), 2);
        assert_eq!(lineage.edges().len(), 2);
    }

    #[test]
    fn remove_vertex_drops_incident_edges() {
        let mut g = sample();
        g.remove_vertex(&Uri::new("g1/worm"));
        assert!(g.get_vertex(&Uri::new("g1/worm")).is_none());
        assert!(g.get_edges(&Uri::new("g1/apple")).is_empty());
    }
}
