//! HTTP server lifecycle

use anyhow::Result;
use axum::Router;
use tracing::{error, info};

/// Serve `router` on `address` until Ctrl+C or SIGTERM
pub async fn serve(address: &str, router: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await.map_err(|e| {
        error!("Failed to bind HTTP address {}: {}", address, e);
        anyhow::anyhow!("Failed to bind {address}: {e}")
    })?;

    info!("HTTP server listening on {}", address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C, starting graceful shutdown..."); }
        () = terminate => { info!("Received SIGTERM, starting graceful shutdown..."); }
    }
}
