//! Subgraph merging and deduplication.
//!
//! Kept as free functions over two (possibly distinct) [`Graph`]s rather
//! than methods, mirroring the shape of the original `util.py` helpers —
//! `merge_subgraph`/`merge_graphs` each need simultaneous `&`/`&mut`
//! access to two different graphs, which reads more plainly as a function
//! of both than as a method borrowing `self` for one side only.

use super::entity::Uri;
use super::graph::Graph;
use super::vertex::Vertex;
use std::collections::{HashMap, HashSet};

/// Attaches the DFS-reachable portion of `x` rooted at `x1` into `y` at
/// `y1`. Converted to an explicit stack per the design notes.
///
/// Idempotent: step 2 (label-match reuse) and step 1 (already-mapped
/// reuse) together mean a second call finds every vertex and edge it
/// would otherwise create already present, and adds nothing.
pub fn merge_subgraph(x: &Graph, x1: &Uri, y: &mut Graph, y1: &Uri) {
    let mut mapping: HashMap<Uri, Uri> = HashMap::new();
    mapping.insert(x1.clone(), y1.clone());
    let mut visited: HashSet<Uri> = HashSet::new();
    let mut stack = vec![x1.clone()];

    while let Some(u) = stack.pop() {
        if visited.contains(&u) {
            continue;
        }
        visited.insert(u.clone());

        let p = match mapping.get(&u) {
            Some(p) => p.clone(),
            None => continue,
        };

        for edge in x.get_edges(&u) {
            let w = &edge.target;
            let w_label = x.get_vertex(w).map(|wv| wv.label.clone());
            let q = if let Some(q) = mapping.get(w) {
                q.clone()
            } else if let Some(existing) = w_label.as_ref().and_then(|w_label| {
                y.get_edges(&p)
                    .into_iter()
                    .find(|e| {
                        e.label == edge.label
                            && y.get_vertex(&e.target)
                                .map(|candidate| &candidate.label == w_label)
                                .unwrap_or(false)
                    })
                    .map(|e| e.target.clone())
            }) {
                existing
            } else {
                let w_vertex = match x.get_vertex(w) {
                    Some(v) => v.clone(),
                    None => continue,
                };
                let cloned = Vertex::new(w_vertex.uri.clone(), w_vertex.label.clone());
                y.add_vertex(cloned);
                w_vertex.uri.clone()
            };

            mapping.insert(w.clone(), q.clone());

            if y.get_edges(&p).iter().all(|e| e.target != q || e.label != edge.label) {
                let _ = y.add_edge(&p, &q, edge.label.clone());
            }

            if !visited.contains(w) {
                stack.push(w.clone());
            }
        }
    }
}

/// Label-keyed union of `g1` and `g2` with a canonical root: the single
/// root is `g1`'s first vertex; any vertex in `g2` whose label equals
/// `g2`'s root label is rewritten to the server root's label/URI before
/// the union. Vertices are merged by label, edges deduplicated by
/// `(source.label, target.label, edge.label)`.
pub fn merge_graphs(g1: &Graph, g2: &Graph) -> Graph {
    let mut merged = Graph::new();
    let mut label_to_vertex: HashMap<String, Uri> = HashMap::new();

    for v in g1.vertices() {
        if !label_to_vertex.contains_key(&v.label) {
            merged.add_vertex(v.clone());
            label_to_vertex.insert(v.label.clone(), v.uri.clone());
        }
    }

    let root_label = g1.vertices().first().map(|v| v.label.clone());
    let root_uri = g1.vertices().first().map(|v| v.uri.clone());

    let mut g2_rewrite: HashMap<Uri, Uri> = HashMap::new();
    for v in g2.vertices() {
        if Some(&v.label) == root_label.as_ref() {
            if let Some(root) = &root_uri {
                g2_rewrite.insert(v.uri.clone(), root.clone());
                continue;
            }
        }
        if let Some(existing) = label_to_vertex.get(&v.label) {
            g2_rewrite.insert(v.uri.clone(), existing.clone());
        } else {
            merged.add_vertex(v.clone());
            label_to_vertex.insert(v.label.clone(), v.uri.clone());
            g2_rewrite.insert(v.uri.clone(), v.uri.clone());
        }
    }

    let mut seen_edges: HashSet<(String, String, String)> = HashSet::new();
    for e in g1.edges() {
        let (Some(sv), Some(tv)) = (g1.get_vertex(&e.source), g1.get_vertex(&e.target)) else {
            continue;
        };
        let key = (sv.label.clone(), tv.label.clone(), e.label.clone());
        if seen_edges.insert(key) {
            let _ = merged.add_edge(&e.source, &e.target, e.label.clone());
        }
    }
    for e in g2.edges() {
        let (Some(sv), Some(tv)) = (g2.get_vertex(&e.source), g2.get_vertex(&e.target)) else {
            continue;
        };
        let key = (sv.label.clone(), tv.label.clone(), e.label.clone());
        if seen_edges.insert(key) {
            let source = g2_rewrite.get(&e.source).cloned().unwrap_or_else(|| e.source.clone());
            let target = g2_rewrite.get(&e.target).cloned().unwrap_or_else(|| e.target.clone());
            let _ = merged.add_edge(&source, &target, e.label.clone());
        }
    }

    merged
}

/// Applies a previously-built subgraph `g1` into `g` at the vertex
/// identified by `uri`. Child reuse and edge dedup are scoped to the
/// *whole* graph `g`, not just the current parent's direct children —
/// matching `original_source/app/src/main/python/util.py`'s
/// `append_subgraph_at_uri`, which builds `label_to_vertex` and
/// `existing_edges` once over all of `g` and consults them at every
/// depth, rather than re-deriving them per parent.
pub fn append_subgraph_at_uri(g: &mut Graph, g1: &Graph, uri: &Uri) {
    let Some(root1) = g1.vertices().first().cloned() else {
        return;
    };
    let Some(_target) = g.get_vertex(uri) else {
        return;
    };

    let mut label_to_vertex: HashMap<String, Uri> = HashMap::new();
    for v in g.vertices() {
        label_to_vertex.entry(v.label.clone()).or_insert_with(|| v.uri.clone());
    }
    let mut existing_edges: HashSet<(String, String, String)> = HashSet::new();
    for e in g.edges() {
        let (Some(sv), Some(tv)) = (g.get_vertex(&e.source), g.get_vertex(&e.target)) else {
            continue;
        };
        existing_edges.insert((sv.label.clone(), tv.label.clone(), e.label.clone()));
    }

    let mut mapping: HashMap<Uri, Uri> = HashMap::new();
    mapping.insert(root1.uri.clone(), uri.clone());
    let mut visited: HashSet<Uri> = HashSet::new();
    let mut stack = vec![root1.uri.clone()];

    while let Some(u) = stack.pop() {
        if visited.contains(&u) {
            continue;
        }
        visited.insert(u.clone());
        let p = match mapping.get(&u) {
            Some(p) => p.clone(),
            None => continue,
        };
        let p_label = match g.get_vertex(&p) {
            Some(v) => v.label.clone(),
            None => continue,
        };

        for edge in g1.get_edges(&u) {
            let w = &edge.target;
            let w_vertex = match g1.get_vertex(w) {
                Some(v) => v.clone(),
                None => continue,
            };

            let q = if let Some(q) = label_to_vertex.get(&w_vertex.label) {
                q.clone()
            } else {
                g.add_vertex(w_vertex.clone());
                label_to_vertex.insert(w_vertex.label.clone(), w_vertex.uri.clone());
                w_vertex.uri.clone()
            };
            let q_label = w_vertex.label.clone();

            let edge_key = (p_label.clone(), q_label, edge.label.clone());
            if existing_edges.insert(edge_key) {
                let _ = g.add_edge(&p, &q, edge.label.clone());
            }

            mapping.insert(w.clone(), q);
            if !visited.contains(w) {
                stack.push(w.clone());
            }
        }
    }
}

/// Groups vertices by `(label, incoming_edge_label)`; within each group the
/// first-inserted is canonical. Every other duplicate has its incoming
/// edges (sharing that edge label) redirected to the canonical vertex,
/// then the duplicate is removed. Outgoing edges of duplicates are left
/// dangling, per the design notes open question.
pub fn remove_duplicate_vertices_by_label_and_edge_label(g: &mut Graph) {
    let mut incoming_label: HashMap<Uri, String> = HashMap::new();
    for e in g.edges() {
        incoming_label.entry(e.target.clone()).or_insert_with(|| e.label.clone());
    }

    let mut groups: HashMap<(String, String), Vec<Uri>> = HashMap::new();
    for v in g.vertices() {
        let key = (
            v.label.clone(),
            incoming_label.get(&v.uri).cloned().unwrap_or_default(),
        );
        groups.entry(key).or_default().push(v.uri.clone());
    }

    for uris in groups.values() {
        if uris.len() < 2 {
            continue;
        }
        let canonical = uris[0].clone();
        let dup_edge_label = incoming_label.get(&canonical).cloned().unwrap_or_default();

        for dup in &uris[1..] {
            let redirect_edges: Vec<Uri> = g
                .edges()
                .iter()
                .filter(|e| &e.target == dup && e.label == dup_edge_label)
                .map(|e| e.source.clone())
                .collect();

            for source in redirect_edges {
                g.remove_edge(&source, dup);
                let _ = g.add_edge(&source, &canonical, dup_edge_label.clone());
            }

            g.remove_vertex(dup);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::vertex::Vertex;

    fn leaf_graph(uri: &str, label: &str) -> Graph {
        let mut g = Graph::new();
        g.add_vertex(Vertex::new(uri, label));
        g
    }

    #[test]
    fn merge_subgraph_is_idempotent() {
        let mut x = Graph::new();
        x.add_vertex(Vertex::new("g2/apple", "apple"));
        x.add_vertex(Vertex::new("g2/caterpillar", "caterpillar"));
        x.add_edge(&Uri::new("g2/apple"), &Uri::new("g2/caterpillar"), "eats")
            .unwrap();

        let mut y = Graph::new();
        y.add_vertex(Vertex::new("g1/apple", "apple"));
        y.add_vertex(Vertex::new("g1/worm", "worm"));
        y.add_edge(&Uri::new("g1/apple"), &Uri::new("g1/worm"), "eats")
            .unwrap();

        merge_subgraph(&x, &Uri::new("g2/apple"), &mut y, &Uri::new("g1/apple"));
        let once_vertices = y.vertices().len();
        let once_edges = y.edges().len();

        merge_subgraph(&x, &Uri::new("g2/apple"), &mut y, &Uri::new("g1/apple"));
        assert_eq!(y.vertices().len(), once_vertices);
        assert_eq!(y.edges().len(), once_edges);
    }

    #[test]
    fn dedup_collapses_same_label_and_incoming_edge_label() {
        let mut g = Graph::new();
        g.add_vertex(Vertex::new("g1/root", "event"));
        g.add_vertex(Vertex::new("g1/year_a", "year"));
        g.add_vertex(Vertex::new("g1/year_b", "year"));
        g.add_edge(&Uri::new("g1/root"), &Uri::new("g1/year_a"), "in_year")
            .unwrap();
        g.add_edge(&Uri::new("g1/root"), &Uri::new("g1/year_b"), "in_year")
            .unwrap();

        remove_duplicate_vertices_by_label_and_edge_label(&mut g);

        let years: Vec<_> = g.vertices().iter().filter(|v| v.label == "year").collect();
        assert_eq!(years.len(), 1);
        assert_eq!(g.get_edges(&Uri::new("g1/root")).len(), 1);
    }

    #[test]
    fn merge_graphs_rewrites_root_and_dedups_edges() {
        let g1 = {
            let mut g = leaf_graph("g1/apple", "apple");
            g.add_vertex(Vertex::new("g1/worm", "worm"));
            g.add_edge(&Uri::new("g1/apple"), &Uri::new("g1/worm"), "eats")
                .unwrap();
            g
        };
        let g2 = {
            let mut g = leaf_graph("g2/apple", "apple");
            g.add_vertex(Vertex::new("g2/worm", "worm"));
            g.add_edge(&Uri::new("g2/apple"), &Uri::new("g2/worm"), "eats")
                .unwrap();
            g
        };

        let merged = merge_graphs(&g1, &g2);
        assert_eq!(merged.vertices().iter().filter(|v| v.label == "apple").count(), 1);
        assert_eq!(merged.vertices().iter().filter(|v| v.label == "worm").count(), 1);
        assert_eq!(merged.edges().len(), 1);
    }
}
