pub mod metrics;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

/// Serves `GET /metrics` until `shutdown_token` is cancelled.
pub async fn run_metrics_server(port: u16, shutdown_token: CancellationToken) -> Result<()> {
    let app = metrics::make_metrics_app();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", port))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await?;
    Ok(())
}
