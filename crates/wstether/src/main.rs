//! wsTether runner
//!
//! Keeps one gateway session alive from a YAML config:
//! - strict config load + validate
//! - reconnect/resume handled by the connection state machine
//! - Ctrl+C requests a graceful shutdown

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use wstether_client::{config, Connection, Dispatcher, WsConnector};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "wstether.yaml".into());
    let cfg = config::load_from_file(&path).expect("config load failed");

    let dispatcher = Arc::new(Dispatcher::new());
    let mut conn =
        Connection::new(cfg, Box::new(WsConnector), dispatcher).expect("invalid config");
    let handle = conn.handle();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown requested");
        handle.shutdown();
    });

    if let Err(e) = conn.run().await {
        tracing::error!(error = %e, "connection terminated");
        std::process::exit(1);
    }
}
