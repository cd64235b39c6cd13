//! tallykv Server Binary
//!
//! Starts the TCP server for one record kind.

use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;
use tallykv::config::TuningFile;
use tallykv::network::Server;
use tallykv::{Config, Engine, ServerMode, Service};
use tracing_subscriber::{fmt, EnvFilter};

/// tallykv Server
#[derive(Parser, Debug)]
#[command(name = "tallykv-server")]
#[command(about = "Store for financial transactions and audit logs")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./tallykv_data")]
    data_dir: PathBuf,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Record kind served: transactions or logs
    #[arg(long, default_value = "transactions")]
    mode: ServerMode,

    /// Worker threads (concurrent connections)
    #[arg(short, long, default_value = "64")]
    max_connections: usize,

    /// YAML tuning file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tallykv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("tallykv server v{}", tallykv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir.display());
    tracing::info!("Listen address: {}", args.listen);
    tracing::info!("Mode: {}", args.mode);

    let tuning = match &args.config {
        Some(path) => match TuningFile::load(path) {
            Ok(tuning) => tuning,
            Err(e) => fail("Failed to load tuning file", &e),
        },
        None => TuningFile::default(),
    };

    let config = Config::builder()
        .tuning(&tuning)
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .build();

    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => fail("Failed to open engine", &e),
    };

    tracing::info!("Engine initialized successfully");

    let service = Arc::new(Service::new(args.mode, Arc::clone(&engine)));
    let server = match Server::bind(config, service) {
        Ok(server) => server,
        Err(e) => fail("Failed to bind listener", &e),
    };

    let shutdown = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        shutdown.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
    }

    if let Err(e) = server.run() {
        fail("Server error", &e);
    }

    // Workers have exited, so this is the last handle
    drop(server);
    match Arc::try_unwrap(engine) {
        Ok(engine) => {
            if let Err(e) = engine.close() {
                fail("Failed to close engine", &e);
            }
        }
        Err(_) => tracing::warn!("Engine still shared at exit; closing on drop"),
    }

    tracing::info!("Server stopped");
}

fn fail(context: &str, error: &tallykv::TallyError) -> ! {
    tracing::error!("{}: {}", context, error);
    eprintln!("{}: {}", context, error);
    process::exit(1);
}
