//! chunkwright: server core for a beta-era block-world protocol.

mod config;

use anyhow::{Context, Result};
use chunkwright_server::{serve, spawn_game, Settings};
use chunkwright_world::{BlockRegistry, ChunkStore, FlatGenerator};
use config::ServerConfig;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::load();
    info!(?config, "starting");

    // A wrong block table is a startup failure, not something to limp
    // along with.
    let blocks = BlockRegistry::load_from_path(&config.block_defs_path)
        .with_context(|| format!("loading {}", config.block_defs_path.display()))?;

    let store = Arc::new(ChunkStore::new(&config.world_path));
    let source = Arc::new(FlatGenerator::new(3, 64));

    let settings = Settings {
        transmit_queue_capacity: config.transmit_queue_capacity,
        chunk_idle_grace: config.chunk_idle_grace(),
        view_radius: config.view_radius,
        ..Settings::default()
    };

    let game = spawn_game(store, source, Arc::new(blocks), settings);

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    serve(listener, game).await
}
