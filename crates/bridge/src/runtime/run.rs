//! Run — drive ingestion from stdin until EOF or a signal.

use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::conf::BridgeConfig;
use crate::ingest::IngestDriver;

/// Run the driver over stdin with signal-triggered shutdown.
pub async fn run(
    driver: IngestDriver,
    _config: BridgeConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let stdin = BufReader::new(tokio::io::stdin());
    driver.run(stdin, shutdown_rx).await?;

    info!("Bridge shut down gracefully");
    Ok(())
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
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
