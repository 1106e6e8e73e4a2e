//! Gamehall multiplayer game server.

use gamehall_core::GameRng;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod protocol;
mod registry;
mod room;
mod server;

use config::ServerConfig;
use registry::{EngineRegistry, StandardFactory};
use server::ServerState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    config.validate()?;

    info!(?config, "Starting Gamehall server...");

    let rng = match config.rng_seed {
        Some(seed) => GameRng::with_seed(seed),
        None => GameRng::from_entropy(),
    };
    let registry = EngineRegistry::new(
        StandardFactory,
        config.engine_cache_capacity,
        config.retry,
        rng,
    );
    let state = Arc::new(ServerState::new(config, registry));

    tokio::spawn(server::run_reaper(Arc::clone(&state)));

    server::run_server(state).await
}
