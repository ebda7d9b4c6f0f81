pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use chrono_tz::Tz;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::{MonitorStatus, Result};

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub service: String,
    /// Written by the level watcher, read by the health endpoints.
    pub monitor_status: Arc<RwLock<MonitorStatus>>,
    pub tz: Tz,
    /// Human-readable session window, e.g. `Mon-Fri 06:30-13:00 US/Pacific`.
    pub market_hours: String,
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors)
}

/// Bind `0.0.0.0:port` and serve the health endpoints until the task is
/// dropped.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Health server listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
