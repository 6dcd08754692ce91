//! Main entry point for the delta-sync relay server.
//!
//! Serves one sequencer per document over WebSocket using the Axum web framework.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use delta_sync::server::{Rooms, create_router};

/// Relay server for collaborative rich-text editing.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "DELTA_SYNC_ADDR", default_value = "127.0.0.1:3000")]
    addr: SocketAddr,

    /// Undelivered events buffered per document before slow sessions are dropped
    #[arg(long, env = "DELTA_SYNC_EVENT_BUFFER", default_value_t = 256)]
    event_buffer: usize,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("Starting delta-sync server...");

    let app = create_router(Arc::new(Rooms::new(args.event_buffer)));

    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    info!("Server listening on http://{}", listener.local_addr()?);
    info!("Available endpoints:");
    info!("  GET  /health          - Health check");
    info!("  GET  /documents/:id   - Document snapshot");
    info!("  GET  /socket/:id      - WebSocket session");

    axum::serve(listener, app).await
}
