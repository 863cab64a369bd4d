//! End-to-end exercise of the encrypted wire protocol: a driver session
//! and a client oracle handler talking over in-process duplex streams,
//! the same framing real TCP sockets use (length-prefixed envelopes,
//! the key-setup handshake, message types 1-5, the termination sentinel).

use paramatch::driver;
use paramatch::embedding::mock::MockEmbedder;
use paramatch::embedding::{self, HeContext};
use paramatch::graph::{Graph, Uri, Vertex};
use paramatch::oracle::{serve_connection, OracleState};
use paramatch::predictor::mock::FirstCandidatePredictor;
use paramatch::session::Config;
use paramatch::wire::{self, KeySetupPayload};
use std::collections::HashMap;

fn build_graphs() -> (Graph, Graph) {
    let mut server = Graph::new();
    server.add_vertex(Vertex::new("g1/apple", "apple"));
    server.add_vertex(Vertex::new("g1/worm", "worm"));
    server.add_edge(&Uri::new("g1/apple"), &Uri::new("g1/worm"), "eats").unwrap();

    let mut client = Graph::new();
    client.add_vertex(Vertex::new("g2/apple", "apple"));
    client.add_vertex(Vertex::new("g2/caterpillar", "caterpillar"));
    client
        .add_edge(&Uri::new("g2/apple"), &Uri::new("g2/caterpillar"), "eats")
        .unwrap();

    (server, client)
}

#[tokio::test]
async fn encrypted_session_merges_sibling_child_over_duplex_streams() {
    let (mut server_graph, client_graph) = build_graphs();

    let embedder = MockEmbedder::new();
    let predictor = FirstCandidatePredictor;
    let he = HeContext::generate(embedding::mock::MOCK_DIMENSION);

    let vertex_pairs: Vec<(Uri, String)> = client_graph.vertices().iter().map(|v| (v.uri.clone(), v.label.clone())).collect();
    let plain = embedding::encode_embedding(&embedder, &vertex_pairs).unwrap();

    let mut client_enc = HashMap::with_capacity(plain.len());
    let mut wire_vertices = Vec::with_capacity(plain.len());
    for (uri, _label) in &vertex_pairs {
        let raw = plain.get(uri).unwrap();
        let normalized = embedding::normalize(raw);
        let enc = he.encrypt(&normalized, false).unwrap();
        wire_vertices.push((uri.to_string(), embedding::serialize(&enc).unwrap()));
        client_enc.insert(uri.clone(), enc);
    }

    let (server_key, public_key) = he.shared_keys_bytes().unwrap();
    let payload = KeySetupPayload {
        dimension: embedding::mock::MOCK_DIMENSION as u32,
        server_key,
        public_key,
        vertices: wire_vertices,
    };

    let (main_s, mut main_c) = tokio::io::duplex(64 * 1024);
    let (oracle_s, oracle_c) = tokio::io::duplex(64 * 1024);

    // Config with a wide-open threshold: this test exercises the wire
    // protocol's plumbing, not the similarity math (already covered by
    // driver::tests and para_match::tests against the plaintext variant).
    let config = Config {
        sigma: 0.0,
        delta: -1.0,
        ..Config::default()
    };

    let client_config = config.clone();
    let mut client_graph_mut = client_graph;
    let client_task = async move {
        wire::write_key_setup(&mut main_c, &payload).await.unwrap();
        let mut state = OracleState {
            he: &he,
            client_graph: &mut client_graph_mut,
            client_embeddings: &client_enc,
            predictor: &predictor,
            embedder: &embedder,
            config: client_config,
        };
        serve_connection(oracle_c, &mut state).await.unwrap();
    };

    let server_task = driver::run_encrypted_session(config, main_s, oracle_s, &mut server_graph, &MockEmbedder::new(), &FirstCandidatePredictor);

    let (report, ()) = tokio::join!(server_task, client_task);
    let report = report.unwrap();

    assert!(report.pairs_matched >= 1);
    assert!(report.vertices_merged >= 1);
    assert!(server_graph.vertices().iter().any(|v| v.label == "caterpillar"));
}

#[tokio::test]
async fn encrypted_session_with_dissimilar_roots_merges_nothing() {
    let mut server_graph = Graph::new();
    server_graph.add_vertex(Vertex::new("g1/apple", "apple"));
    let client_graph = {
        let mut g = Graph::new();
        g.add_vertex(Vertex::new("g2/car", "car"));
        g
    };

    let embedder = MockEmbedder::new();
    let predictor = FirstCandidatePredictor;
    let he = HeContext::generate(embedding::mock::MOCK_DIMENSION);

    let vertex_pairs: Vec<(Uri, String)> = client_graph.vertices().iter().map(|v| (v.uri.clone(), v.label.clone())).collect();
    let plain = embedding::encode_embedding(&embedder, &vertex_pairs).unwrap();

    let mut client_enc = HashMap::with_capacity(plain.len());
    let mut wire_vertices = Vec::with_capacity(plain.len());
    for (uri, _label) in &vertex_pairs {
        let raw = plain.get(uri).unwrap();
        let normalized = embedding::normalize(raw);
        let enc = he.encrypt(&normalized, false).unwrap();
        wire_vertices.push((uri.to_string(), embedding::serialize(&enc).unwrap()));
        client_enc.insert(uri.clone(), enc);
    }

    let (server_key, public_key) = he.shared_keys_bytes().unwrap();
    let payload = KeySetupPayload {
        dimension: embedding::mock::MOCK_DIMENSION as u32,
        server_key,
        public_key,
        vertices: wire_vertices,
    };

    let (main_s, mut main_c) = tokio::io::duplex(64 * 1024);
    let (oracle_s, oracle_c) = tokio::io::duplex(64 * 1024);
    let config = Config::default();

    let client_config = config.clone();
    let mut client_graph_mut = client_graph;
    let client_task = async move {
        wire::write_key_setup(&mut main_c, &payload).await.unwrap();
        let mut state = OracleState {
            he: &he,
            client_graph: &mut client_graph_mut,
            client_embeddings: &client_enc,
            predictor: &predictor,
            embedder: &embedder,
            config: client_config,
        };
        serve_connection(oracle_c, &mut state).await.unwrap();
    };

    let server_task = driver::run_encrypted_session(config, main_s, oracle_s, &mut server_graph, &MockEmbedder::new(), &FirstCandidatePredictor);

    let (report, ()) = tokio::join!(server_task, client_task);
    let report = report.unwrap();

    assert_eq!(report.pairs_matched, 0);
    assert_eq!(report.vertices_merged, 0);
    assert_eq!(server_graph.vertices().len(), 1);
}
