//! CLI for framebus
//!
//! Subcommands:
//! - `server`: run the broker behind the WebSocket bridge

use clap::Parser;
use framebus::MessageBrokerEngine;
use framebus::config::load_config;
use framebus::transport::{WebSocketTransport, start_websocket_server};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "framebus")]
enum Command {
    /// Start the WebSocket bridge
    Server {
        /// Port to bind, overriding the configured one
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    let cmd = Command::parse();

    match cmd {
        Command::Server { port } => {
            if let Err(e) = run_server(port).await {
                framebus::utils::logging::init("info");
                error!("Server failed: {}", e);
            }
        }
    }
}

async fn run_server(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config()?;
    framebus::utils::logging::init(&config.log.level);
    if let Some(port) = port {
        config.server.port = port;
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let transport = Arc::new(WebSocketTransport::new());
    let engine = Arc::new(Mutex::new(MessageBrokerEngine::new(
        &config.broker,
        transport.clone(),
    )));
    info!(
        "Accepting origins: {}",
        config.broker.accepted_origins.join(", ")
    );

    tokio::select! {
        result = start_websocket_server(addr, engine, transport) => {
            result?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}
