//! Legacy WebSocket messaging server (v1)
//!
//! Accepts raw TCP connections, upgrades them with the draft-75/76
//! handshake and relays every inbound message to all established peers.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────┐
//!                       │                 EVENT LOOP (1 task)            │
//!   Client ─────────────┼─▶ listener ──▶ registry (AwaitingHandshake)   │
//!                       │                    │                           │
//!   reader tasks ───────┼─▶ SocketEvent ─────┤                           │
//!                       │                    ├─▶ handshake ──▶ Established
//!                       │                    └─▶ dispatcher ──▶ handler  │
//!                       │                                        │       │
//!   Client ◀────────────┼── writer tasks ◀── frame wrap ◀────────┘       │
//!                       └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use ws_legacy_server::config::{load_config, validate_config, ConfigError, ServerConfig};
use ws_legacy_server::lifecycle::{self, signals, Shutdown};
use ws_legacy_server::observability::{logging, metrics};
use ws_legacy_server::{Server, SocketHandle};

#[derive(Parser)]
#[command(name = "ws-legacy-server")]
#[command(about = "Legacy WebSocket messaging server", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,

    /// Override observability.log_level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability)?;
    tracing::info!("ws-legacy-server v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        // Validation guarantees the address parses.
        let addr = config.observability.metrics_address.parse()?;
        if let Err(e) = metrics::init_metrics(addr) {
            tracing::error!(error = %e, "Failed to start metrics endpoint");
        }
    }

    let shutdown = Shutdown::new();
    let launched = match lifecycle::launch(&config, relay, &shutdown) {
        Ok(launched) => launched,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };
    tracing::info!(address = %launched.local_addr, "Listening for connections");

    let mut task = launched.task;
    tokio::select! {
        result = &mut task => result?,
        result = signals::wait_for_signal() => {
            result?;
            shutdown.trigger();
            task.await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Rebroadcast every message to all established connections.
fn relay(connection: SocketHandle, message: &[u8], server: &mut Server) {
    let delivered = server.broadcast(message);
    tracing::debug!(from = %connection, delivered, "Relayed message");
}
