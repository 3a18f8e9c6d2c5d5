//! Iris dispatch relay - Main entry point.
//!
//! Reads `<room_id> <text>` lines from stdin and sends each one to its room
//! through the background send pool.

mod config;
mod error;
mod relay;

use crate::config::Config;
use crate::error::AppResult;
use anyhow::Context;
use talk_client::DispatchClient;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_logging(&config.log.level);

    info!("Starting Iris dispatch relay...");

    let client = DispatchClient::new(config.dispatch_options())?;
    let endpoint = config.iris.endpoint.as_str();

    // Credential probe
    match client.credential(endpoint, false).await {
        Ok(credential) => info!("Gateway credential ready (device {})", credential.device_id),
        Err(e) => warn!("Gateway credential unavailable - will retry on send: {}", e),
    }

    info!(
        "Relaying stdin to {} ({} workers, queue {})",
        config.talk.write_url, config.workers.size, config.workers.queue_capacity
    );

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());

    // Main relay loop
    loop {
        tokio::select! {
            line = lines.next() => match line {
                Some(Ok(line)) => relay::relay_line(&client, endpoint, &line).await,
                Some(Err(e)) => {
                    error!("Failed to read input: {}", e);
                    break;
                }
                None => {
                    info!("Input closed");
                    break;
                }
            },
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Shutting down...");
    client.shutdown().await;
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
