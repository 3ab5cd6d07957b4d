//! ExSim API Server implementation
//!
//! HTTP REST API over the shared output broker, so dashboards that are not
//! Rust processes can export and import through the same store.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::handlers;
use crate::broker::{JsonFileStore, SharedOutputBroker};
use crate::config::SHARED_OUTPUTS_FILE;

/// API Server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub store_path: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            store_path: PathBuf::from(SHARED_OUTPUTS_FILE),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub broker: Arc<SharedOutputBroker>,
}

impl AppState {
    pub fn new(broker: SharedOutputBroker) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            broker: Arc::new(broker),
        }
    }
}

/// Build the router with all endpoints, CORS and request tracing
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        // Broker endpoints
        .route("/api/v1/status", get(handlers::status))
        .route("/api/v1/graph", get(handlers::graph))
        .route("/api/v1/export", post(handlers::export))
        .route("/api/v1/import/:dashboard", get(handlers::import))
        .route("/api/v1/dependencies/:dashboard", get(handlers::dependencies))
        .route("/api/v1/clear", post(handlers::clear))
        // Market report
        .route("/api/v1/market/map", post(handlers::map_market))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server
pub async fn run_api_server(config: ApiConfig) -> anyhow::Result<()> {
    // A subscriber may already be installed by an embedding binary
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exsim=info,tower_http=info".into()),
        )
        .try_init();

    let store = Arc::new(JsonFileStore::new(&config.store_path));
    let broker = SharedOutputBroker::open(store)?;
    let app = build_router(Arc::new(AppState::new(broker)));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("📡 ExSim API Server starting on http://{}", addr);
    info!("   Store: {}", config.store_path.display());
    info!("   Endpoints: /api/v1/status, /api/v1/graph, /api/v1/export, /api/v1/import/:dashboard, /api/v1/dependencies/:dashboard, /api/v1/clear, /api/v1/market/map");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("ExSim API Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryStore;

    // ==================== ApiConfig Tests ====================

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.store_path, PathBuf::from("shared_outputs.json"));
    }

    #[test]
    fn test_config_address_format() {
        let config = ApiConfig {
            host: "192.168.1.100".to_string(),
            port: 9090,
            ..ApiConfig::default()
        };
        let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse().unwrap();
        assert_eq!(addr.port(), 9090);
    }

    // ==================== AppState Tests ====================

    #[test]
    fn test_app_state_carries_crate_version() {
        let broker = SharedOutputBroker::open(Arc::new(MemoryStore::new())).unwrap();
        let state = AppState::new(broker);
        assert_eq!(state.version, env!("CARGO_PKG_VERSION"));

        let shared = Arc::new(state);
        let clone = Arc::clone(&shared);
        assert!(Arc::ptr_eq(&shared.broker, &clone.broker));
    }
}
