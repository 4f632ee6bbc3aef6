//! Random-Pairing Chat Hub - Entry Point
//!
//! Starts the TCP listener and Hub actor, accepting connections.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_hub::{serve, Config, Hub, InMemoryFriendships, InMemoryMessages};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_hub=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_hub=info")),
        )
        .init();

    let mut config = Config::from_env()?;

    // Bind address from command line overrides the environment
    if let Some(addr) = env::args().nth(1) {
        config.addr = addr;
    }

    // Start TCP listener
    let listener = TcpListener::bind(&config.addr).await?;
    info!("Chat hub listening on {}", config.addr);

    // Create Hub actor channel and start
    let (event_tx, event_rx) = mpsc::channel(config.event_buffer);
    let hub = Hub::new(
        event_rx,
        Arc::new(InMemoryFriendships::new()),
        Arc::new(InMemoryMessages::new()),
    )
    .with_call_timeout(config.call_timeout);
    tokio::spawn(hub.run());

    info!(
        outbound_capacity = config.outbound_capacity,
        call_timeout = ?config.call_timeout,
        "Hub actor started"
    );

    // Connection accept loop
    serve(listener, event_tx, config.outbound_capacity).await;

    Ok(())
}
