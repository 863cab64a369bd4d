//! Dataset JSON loader and Cytoscape-form serializer (§6 external interfaces).

use super::entity::Uri;
use super::graph::Graph;
use super::vertex::Vertex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write output file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse dataset JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("dataset node {0} has no labels")]
    MissingLabel(String),
}

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Deserialize)]
struct RawNode {
    id: String,
    labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawEdge {
    #[allow(dead_code)]
    id: String,
    source: String,
    target: String,
    labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    nodes: Vec<RawNode>,
    edges: Vec<RawEdge>,
}

/// Loads a dataset JSON file, prefixing every node/edge id with
/// `"{prefix}/"`. Only `labels[0]` is consumed, matching the original
/// loader.
pub fn load_dataset(path: impl AsRef<Path>, prefix: &str) -> DatasetResult<Graph> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| DatasetError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let dataset: RawDataset = serde_json::from_str(&raw)?;

    let mut graph = Graph::new();
    for node in &dataset.nodes {
        let label = node
            .labels
            .first()
            .cloned()
            .ok_or_else(|| DatasetError::MissingLabel(node.id.clone()))?;
        let uri = Uri::new(node.id.clone()).prefixed(prefix);
        graph.add_vertex(Vertex::new(uri, label));
    }
    for edge in &dataset.edges {
        let Some(label) = edge.labels.first().cloned() else {
            continue;
        };
        let source = Uri::new(edge.source.clone()).prefixed(prefix);
        let target = Uri::new(edge.target.clone()).prefixed(prefix);
        let _ = graph.add_edge(&source, &target, label);
    }

    Ok(graph)
}

#[derive(Debug, Serialize)]
struct CytoscapeNode {
    id: String,
    labels: [String; 1],
}

#[derive(Debug, Serialize)]
struct CytoscapeEdge {
    id: String,
    source: String,
    target: String,
    labels: [String; 1],
}

#[derive(Debug, Serialize)]
struct CytoscapeGraph {
    nodes: Vec<CytoscapeNode>,
    edges: Vec<CytoscapeEdge>,
}

pub fn serialize_to_cytoscape(graph: &Graph) -> serde_json::Value {
    let nodes = graph
        .vertices()
        .iter()
        .map(|v| CytoscapeNode {
            id: v.uri.to_string(),
            labels: [v.label.clone()],
        })
        .collect();
    let edges = graph
        .edges()
        .iter()
        .enumerate()
        .map(|(i, e)| CytoscapeEdge {
            id: format!("e{}", i + 1),
            source: e.source.to_string(),
            target: e.target.to_string(),
            labels: [e.label.clone()],
        })
        .collect();
    serde_json::to_value(CytoscapeGraph { nodes, edges }).expect("cytoscape graph always serializes")
}

/// Writes the Cytoscape form to `path`, overwriting any prior copy.
pub fn save_cytoscape_json(graph: &Graph, path: impl AsRef<Path>) -> DatasetResult<()> {
    let path = path.as_ref();
    if path.exists() {
        fs::remove_file(path).map_err(|source| DatasetError::Write {
            path: path.display().to_string(),
            source,
        })?;
    }
    let value = serialize_to_cytoscape(graph);
    let pretty = serde_json::to_string_pretty(&value)?;
    fs::write(path, pretty).map_err(|source| DatasetError::Write {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn load_dataset_prefixes_ids_and_takes_first_label() {
        let json = r#"{
            "nodes": [
                {"id": "a", "labels": ["apple", "fruit"]},
                {"id": "b", "labels": ["worm"]}
            ],
            "edges": [
                {"id": "e1", "source": "a", "target": "b", "labels": ["eats"]}
            ]
        }"#;
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), json).unwrap();

        let graph = load_dataset(file.path(), "g1").unwrap();
        assert!(graph.get_vertex(&Uri::new("g1/a")).is_some());
        assert_eq!(graph.get_vertex(&Uri::new("g1/a")).unwrap().label, "apple");
        assert_eq!(graph.get_edges(&Uri::new("g1/a")).len(), 1);
    }

    #[test]
    fn round_trip_through_cytoscape_preserves_shape() {
        let json = r#"{
            "nodes": [{"id": "a", "labels": ["apple"]}, {"id": "b", "labels": ["worm"]}],
            "edges": [{"id": "e1", "source": "a", "target": "b", "labels": ["eats"]}]
        }"#;
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), json).unwrap();
        let graph = load_dataset(file.path(), "g1").unwrap();

        let value = serialize_to_cytoscape(&graph);
        let reparsed: RawDataset = serde_json::from_value(value).unwrap();
        assert_eq!(reparsed.nodes.len(), graph.vertices().len());
        assert_eq!(reparsed.edges.len(), graph.edges().len());
    }
}
