//! ParaMatch CLI — privacy-preserving graph enrichment protocol (§6 CLI/host
//! knobs, §A.5 of `SPEC_FULL.md`).
//!
//! Usage:
//!   paramatch server --dataset g1.json --host 0.0.0.0 --port 65432 --oracle-host 127.0.0.1
//!   paramatch client --dataset g2.json --connect-host 127.0.0.1 --port 65432
//!   paramatch simulate --server-dataset g1.json --client-dataset g2.json

use clap::{Parser, Subcommand};
use paramatch::driver;
use paramatch::embedding::mock::{MockEmbedder, MOCK_DIMENSION};
use paramatch::embedding::{self, HeContext};
use paramatch::graph::{load_dataset, save_cytoscape_json, Graph, Uri};
use paramatch::oracle::{serve_connection, serve_plaintext_connection, OracleState, PlainOracleState};
use paramatch::predictor::mock::FirstCandidatePredictor;
use paramatch::session::{Config, SecurityMode};
use paramatch::wire::{self, KeySetupPayload};
use paramatch::ParaMatchResult;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::net::{TcpListener, TcpStream};

#[derive(Parser)]
#[command(name = "paramatch", version, about = "Privacy-preserving graph enrichment protocol")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server role (S): discovers matches against a connected
    /// client and merges its matched subgraphs in (§4.6).
    Server {
        #[arg(long)]
        dataset: PathBuf,
        /// Address this session's main socket binds to.
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Shared session port; the oracle is always `port + 10` (§6).
        #[arg(long, default_value_t = 65432)]
        port: u16,
        /// Address C's oracle listens on. Defaults to `host`.
        #[arg(long)]
        oracle_host: Option<String>,
        /// Selects the similarity backend (§6 "`security_mode` boolean"):
        /// `encrypted` speaks the masked-oracle protocol, `plaintext`
        /// speaks the §4.7 mirror variant over the same wire taxonomy
        /// with no HE at all. Must match the peer's `--security-mode`.
        #[arg(long, value_enum, default_value = "encrypted")]
        security_mode: SecurityMode,
        #[arg(long, default_value = "graph.json")]
        output: PathBuf,
    },
    /// Run the client role (C): holds the secret key, answers the
    /// decryption oracle, and applies enrichment pushes (§4.6).
    Client {
        #[arg(long)]
        dataset: PathBuf,
        /// Address of S's main socket.
        #[arg(long, default_value = "127.0.0.1")]
        connect_host: String,
        /// Address this session's oracle listener binds to.
        #[arg(long, default_value = "0.0.0.0")]
        bind_host: String,
        #[arg(long, default_value_t = 65432)]
        port: u16,
        /// Must match the server's `--security-mode` (§6).
        #[arg(long, value_enum, default_value = "encrypted")]
        security_mode: SecurityMode,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run both roles in one process against the plaintext mirror variant
    /// (§4.7) — no sockets, no HE. Ground truth for correctness checks,
    /// not a networked mode.
    Simulate {
        #[arg(long)]
        server_dataset: PathBuf,
        #[arg(long)]
        client_dataset: PathBuf,
        #[arg(long, default_value = "graph.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Server {
            dataset,
            host,
            port,
            oracle_host,
            security_mode,
            output,
        } => run_server(dataset, host, port, oracle_host, security_mode, output).await,
        Commands::Client {
            dataset,
            connect_host,
            bind_host,
            port,
            security_mode,
            output,
        } => run_client(dataset, connect_host, bind_host, port, security_mode, output).await,
        Commands::Simulate {
            server_dataset,
            client_dataset,
            output,
        } => run_simulate(server_dataset, client_dataset, output).await,
    };

    if let Err(err) = result {
        tracing::error!(%err, "session aborted");
        std::process::exit(1);
    }
}

async fn run_server(
    dataset: PathBuf,
    host: String,
    port: u16,
    oracle_host: Option<String>,
    security_mode: SecurityMode,
    output: PathBuf,
) -> ParaMatchResult<()> {
    let config = Config {
        host: host.clone(),
        port,
        security_mode,
        ..Config::default()
    };
    let oracle_host = oracle_host.unwrap_or_else(|| host.clone());

    let mut server_graph = load_dataset(&dataset, "g1")?;
    let embedder = MockEmbedder::new();
    let predictor = FirstCandidatePredictor;

    let listener = TcpListener::bind((host.as_str(), port)).await.map_err(|e| wire::WireError::Io(e))?;
    tracing::info!(%host, port, ?security_mode, "server: listening for the client's key-setup handshake");
    let (main_stream, peer) = listener.accept().await.map_err(|e| wire::WireError::Io(e))?;
    tracing::info!(%peer, "server: client connected");

    let oracle_port = config.oracle_port();
    let oracle_stream = TcpStream::connect((oracle_host.as_str(), oracle_port))
        .await
        .map_err(|e| wire::WireError::Io(e))?;
    tracing::info!(%oracle_host, oracle_port, "server: connected to client's decryption oracle");

    let report = match security_mode {
        SecurityMode::Encrypted => {
            driver::run_encrypted_session(config, main_stream, oracle_stream, &mut server_graph, &embedder, &predictor).await?
        }
        SecurityMode::Plaintext => {
            driver::run_networked_plaintext_session(config, main_stream, oracle_stream, &mut server_graph, &embedder, &predictor).await?
        }
    };
    tracing::info!(pairs_matched = report.pairs_matched, vertices_merged = report.vertices_merged, "server: session complete");

    save_cytoscape_json(&server_graph, &output)?;
    tracing::info!(path = %output.display(), "server: wrote enriched graph");
    Ok(())
}

async fn run_client(
    dataset: PathBuf,
    connect_host: String,
    bind_host: String,
    port: u16,
    security_mode: SecurityMode,
    output: Option<PathBuf>,
) -> ParaMatchResult<()> {
    let config = Config {
        host: connect_host.clone(),
        port,
        security_mode,
        ..Config::default()
    };

    let mut client_graph = load_dataset(&dataset, "g2")?;
    let embedder = MockEmbedder::new();
    let predictor = FirstCandidatePredictor;

    let vertices: Vec<(Uri, String)> = client_graph.vertices().iter().map(|v| (v.uri.clone(), v.label.clone())).collect();
    let plain = embedding::encode_embedding(&embedder, &vertices)?;

    tracing::info!(%connect_host, port, ?security_mode, "client: connecting to the server's main socket");
    let mut main_stream = TcpStream::connect((connect_host.as_str(), port)).await.map_err(|e| wire::WireError::Io(e))?;

    let oracle_port = config.oracle_port();
    let oracle_listener = TcpListener::bind((bind_host.as_str(), oracle_port)).await.map_err(|e| wire::WireError::Io(e))?;
    tracing::info!(%bind_host, oracle_port, "client: listening for the server's oracle connection");

    match security_mode {
        SecurityMode::Encrypted => {
            let he = HeContext::generate(MOCK_DIMENSION);

            let mut client_enc: HashMap<Uri, embedding::EncVector> = HashMap::with_capacity(plain.len());
            let mut wire_vertices: Vec<(String, Vec<u8>)> = Vec::with_capacity(plain.len());
            for (uri, _label) in &vertices {
                let raw = plain.get(uri).expect("embedding computed for every vertex");
                let normalized = embedding::normalize(raw);
                let enc = he.encrypt(&normalized, false)?;
                wire_vertices.push((uri.to_string(), embedding::serialize(&enc)?));
                client_enc.insert(uri.clone(), enc);
            }

            let (server_key, public_key) = he.shared_keys_bytes()?;
            let payload = KeySetupPayload {
                dimension: MOCK_DIMENSION as u32,
                server_key,
                public_key,
                vertices: wire_vertices,
            };
            wire::write_key_setup(&mut main_stream, &payload).await?;
            tracing::info!("client: key-setup handshake sent");

            let (oracle_stream, peer) = oracle_listener.accept().await.map_err(|e| wire::WireError::Io(e))?;
            tracing::info!(%peer, "client: oracle connection accepted");

            let mut state = OracleState {
                he: &he,
                client_graph: &mut client_graph,
                client_embeddings: &client_enc,
                predictor: &predictor,
                embedder: &embedder,
                config,
            };
            serve_connection(oracle_stream, &mut state).await?;
        }
        SecurityMode::Plaintext => {
            let mut wire_vertices: Vec<(String, Vec<u8>)> = Vec::with_capacity(plain.len());
            for (uri, _label) in &vertices {
                let raw = plain.get(uri).expect("embedding computed for every vertex");
                let normalized = embedding::normalize(raw);
                wire_vertices.push((uri.to_string(), bincode::serialize(&normalized).map_err(wire::WireError::from)?));
            }

            let payload = KeySetupPayload {
                dimension: MOCK_DIMENSION as u32,
                server_key: Vec::new(),
                public_key: Vec::new(),
                vertices: wire_vertices,
            };
            wire::write_key_setup(&mut main_stream, &payload).await?;
            tracing::info!("client: plaintext key-setup handshake sent");

            let (oracle_stream, peer) = oracle_listener.accept().await.map_err(|e| wire::WireError::Io(e))?;
            tracing::info!(%peer, "client: oracle connection accepted");

            let mut state = PlainOracleState {
                client_graph: &mut client_graph,
                predictor: &predictor,
                embedder: &embedder,
                config,
            };
            serve_plaintext_connection(oracle_stream, &mut state).await?;
        }
    }
    tracing::info!("client: session terminated");

    if let Some(output) = output {
        save_cytoscape_json(&client_graph, &output)?;
        tracing::info!(path = %output.display(), "client: wrote final graph");
    }
    Ok(())
}

async fn run_simulate(server_dataset: PathBuf, client_dataset: PathBuf, output: PathBuf) -> ParaMatchResult<()> {
    let mut server_graph: Graph = load_dataset(&server_dataset, "g1")?;
    let client_graph = load_dataset(&client_dataset, "g2")?;
    let embedder = MockEmbedder::new();
    let predictor = FirstCandidatePredictor;

    let report = driver::run_plaintext_session(Config::default(), &mut server_graph, &client_graph, &embedder, &predictor).await?;
    tracing::info!(pairs_matched = report.pairs_matched, vertices_merged = report.vertices_merged, "simulate: session complete");

    save_cytoscape_json(&server_graph, &output)?;
    tracing::info!(path = %output.display(), "simulate: wrote enriched graph");
    Ok(())
}
