//! Web server module.

mod handlers;
mod state;

pub use handlers::*;
pub use state::*;

use crate::config::ConfigFile;
use crate::probe::HttpClient;
use crate::scheduler::EndpointRegistry;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: EndpointRegistry,
    pub monitor: Arc<MonitorState>,
    /// Used by manual refreshes.
    pub client: Arc<dyn HttpClient>,
    /// Where endpoint edits are saved; `None` keeps them in memory only.
    pub config_file: Option<Arc<ConfigFile>>,
}

/// Ports tried, starting at the requested one, before giving up.
pub const PORT_ATTEMPTS: u16 = 10;

/// Bind `port`, or the next free port among the following attempts.
pub async fn bind_with_fallback(port: u16, attempts: u16) -> std::io::Result<TcpListener> {
    let mut last_err = None;

    for offset in 0..attempts.max(1) {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], candidate))).await {
            Ok(listener) => {
                if offset > 0 {
                    tracing::warn!("Port {} is busy, using {} instead", port, candidate);
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => last_err = Some(e),
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::AddrInUse, format!("no free port from {}", port))
    }))
}

/// Dashboard server.
pub struct Server {
    port: u16,
    state: AppState,
}

impl Server {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

        Router::new()
            // Dashboard
            .route("/", get(handlers::handle_dashboard))
            // Monitoring data
            .route("/api/data", get(handlers::handle_get_data))
            .route("/api/stats", get(handlers::handle_get_stats))
            .route("/api/history", get(handlers::handle_get_history))
            .route("/api/alerts", get(handlers::handle_get_alerts))
            .route(
                "/api/refresh",
                get(handlers::handle_refresh).post(handlers::handle_refresh),
            )
            // Endpoint management
            .route(
                "/api/apis",
                get(handlers::handle_get_endpoints).post(handlers::handle_create_endpoint),
            )
            .route(
                "/api/apis/{name}",
                put(handlers::handle_update_endpoint).delete(handlers::handle_delete_endpoint),
            )
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(64 * 1024))
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` is cancelled.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let router = self.routes();

        let listener = bind_with_fallback(self.port, PORT_ATTEMPTS).await?;
        tracing::info!("Dashboard listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        Ok(())
    }
}
