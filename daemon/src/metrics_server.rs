//! `/metrics` endpoint for a watching probe.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use lit_network::NetworkMetrics;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;

pub fn router(metrics: Arc<NetworkMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(render))
        .with_state(metrics)
}

async fn render(State(metrics): State<Arc<NetworkMetrics>>) -> (StatusCode, String) {
    match metrics.render() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Serve until `shutdown` fires.
pub async fn serve(
    addr: SocketAddr,
    metrics: Arc<NetworkMetrics>,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics endpoint listening");
    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
