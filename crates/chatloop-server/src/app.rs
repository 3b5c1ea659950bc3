//! Server assembly: shared state, routes and the listener.

use crate::auth::Directory;
use crate::config::{Config, StorageBackend, StorageConfig};
use crate::{api, metrics, ws};
use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::Method;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use chatloop_core::{Hub, HubConfig, MemoryStore, MessageStore, SqliteStore, TYPING_EXPIRY};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared server state.
pub struct AppState {
    /// The realtime core.
    pub hub: Hub,
    /// Known identities.
    pub directory: Directory,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create app state over an already opened store.
    #[must_use]
    pub fn new(config: Config, store: Arc<dyn MessageStore>) -> Self {
        let hub_config = HubConfig {
            handle_capacity: config.limits.handle_capacity,
            max_text_length: config.limits.max_text_length,
        };

        Self {
            hub: Hub::with_config(store, hub_config),
            directory: Directory::new(&config.users),
            config,
        }
    }

    /// Open the configured store and create app state.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn from_config(config: Config) -> Result<Self> {
        let store = open_store(&config.storage)?;
        Ok(Self::new(config, store))
    }
}

/// Open the configured message store.
///
/// # Errors
///
/// Returns an error if the SQLite database cannot be opened or migrated.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn MessageStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Sqlite => {
            let path = shellexpand::tilde(&config.path).into_owned();
            let store = SqliteStore::open(&path)
                .with_context(|| format!("Failed to open message store at {path}"))?;
            Ok(Arc::new(store))
        }
    }
}

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    let max_body_size = state.config.limits.max_body_size;
    let websocket_path = state.config.transport.websocket_path.clone();

    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route(&websocket_path, get(ws::ws_handler))
        .route("/api/messages/users", get(api::list_peers))
        .route("/api/messages/:peer_id", get(api::conversation))
        .route("/api/messages/send/:peer_id", put(api::send_message))
        .route("/api/messages/mark/:message_id", put(api::mark_seen))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the listener fails.
pub async fn run_server(config: Config) -> Result<()> {
    // Start metrics server if enabled
    if config.metrics.enabled {
        metrics::init_metrics();
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let addr = config.bind_addr()?;
    let websocket_path = config.transport.websocket_path.clone();
    let state = Arc::new(AppState::from_config(config)?);

    info!(
        store = state.hub.store_name(),
        users = state.directory.len(),
        "State initialized"
    );

    let app = build_router(state);
    let listener = TcpListener::bind(addr).await?;

    info!("ChatLoop server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}{}", addr, websocket_path);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.hub.stats();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "online": stats.online_identities,
        "connections": stats.handles,
        "typingExpiryMs": TYPING_EXPIRY.as_millis() as u64,
    }))
}
