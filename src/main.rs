//! easel-server - collaborative whiteboard coordination daemon

use anyhow::Result;
use clap::Parser;
use easel::access::LocalIdentity;
use easel::board::{Board, Visibility};
use easel::config::Config;
use easel::server::{ServerContext, ServerListener};
use easel::session::{SessionRegistry, SystemClock};
use easel::store::MemoryStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "easel-server")]
#[command(about = "Real-time collaborative whiteboard server")]
#[command(version)]
struct Cli {
    /// Address to bind, overriding the config file
    #[arg(short, long)]
    bind: Option<String>,

    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let bind = cli.bind.unwrap_or(config.server.bind);

    // Development setup: in-memory persistence seeded with one open board
    let store = Arc::new(MemoryStore::new());
    let board = Board::new("scratchpad", Uuid::new_v4(), Visibility::Public);
    tracing::info!("Seeded public board {}", board.id);
    store.add_board(board);

    let sessions = SessionRegistry::with_clock(
        Arc::new(SystemClock),
        chrono::Duration::minutes(config.session.expiry_minutes),
    );
    let context = Arc::new(ServerContext::with_sessions(
        store.clone(),
        store,
        Arc::new(LocalIdentity),
        sessions,
    ));

    let listener = ServerListener::bind(&bind, context).await?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(()).await;
        }
    });

    listener.run(shutdown_rx).await
}
