//! Graph data model: vertices, edges, lineage extraction, subgraph
//! merging, and deduplication (§3, §4.1).

mod dataset;
mod edge;
mod entity;
mod graph;
mod merge;
mod vertex;

pub use dataset::{
    load_dataset, save_cytoscape_json, serialize_to_cytoscape, DatasetError, DatasetResult,
};
pub use edge::Edge;
pub use entity::Uri;
pub use graph::{Graph, GraphError, GraphResult, Lookup};
pub use merge::{
    append_subgraph_at_uri, merge_graphs, merge_subgraph, remove_duplicate_vertices_by_label_and_edge_label,
};
pub use vertex::Vertex;
