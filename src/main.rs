//! Arena Server - Authoritative 2D team-deathmatch game server
//!
//! Owns all simulation state: players, projectiles, power-ups, dropped
//! weapons, and breakable objects. Clients connect over TCP, speak
//! newline-delimited JSON, and receive a full world snapshot every tick.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arena_server::config::Config;
use arena_server::game::{self, World};
use arena_server::map::GameMap;
use arena_server::net::GameServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(Config::from_env()?);

    // Initialize tracing
    init_tracing(&config.log_level);

    info!("Starting Arena Server");
    info!(
        addr = %config.server_addr,
        max_players = config.max_players,
        num_teams = config.num_teams,
        tick_rate = config.tick_rate,
        kill_limit = config.kill_limit,
        "configuration loaded"
    );

    // Load the tile map
    let map = match &config.map_file {
        Some(path) => {
            info!(path = %path.display(), "loading map file");
            Arc::new(GameMap::from_file(path)?)
        }
        None => Arc::new(GameMap::default_layout()),
    };

    // Create the world behind the single server-wide lock
    let world = Arc::new(Mutex::new(World::new(config.clone(), map)));

    // Spawn the tick engine
    let tick_world = world.clone();
    tokio::spawn(async move {
        game::tick::run(tick_world).await;
    });

    // Run the listener until the match ends or we get a signal
    let server = GameServer::new(config, world);
    tokio::select! {
        result = server.run() => result?,
        _ = shutdown_signal() => {
            info!("received shutdown signal");
        }
    }

    // Give writer tasks a moment to flush final messages
    tokio::time::sleep(Duration::from_millis(200)).await;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
