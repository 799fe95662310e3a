//! HTTP surface for the timeline garden.
//!
//! # Responsibility
//! - Own the process-wide [`AppState`] (one SQLite connection, session
//!   store, optional password).
//! - Route `/api/*` requests to core services.
//!
//! # Invariants
//! - No module-level state: everything handlers touch lives in `AppState`.
//! - The database lock is never held across an `.await`.

pub mod config;
pub mod http;
pub mod session;

use std::error::Error;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use garden_core::db::{open_db, DbError};
use log::info;
use rusqlite::Connection;

use crate::config::ServerConfig;
use crate::http::ApiError;
use crate::session::SessionStore;

/// Shared application state.
pub struct AppState {
    pub db: Mutex<Connection>,
    pub sessions: SessionStore,
    /// Login password. `None` disables the session gate.
    pub password: Option<String>,
}

impl AppState {
    pub fn new(conn: Connection, password: Option<String>) -> Self {
        Self {
            db: Mutex::new(conn),
            sessions: SessionStore::default(),
            password,
        }
    }

    /// Opens (and migrates) the configured database file.
    pub fn open(config: &ServerConfig) -> Result<Self, DbError> {
        let conn = open_db(&config.db_path)?;
        Ok(Self::new(conn, config.password.clone()))
    }

    pub fn requires_login(&self) -> bool {
        self.password.is_some()
    }

    /// Runs `work` with exclusive access to the connection.
    pub fn with_db<T>(
        &self,
        work: impl FnOnce(&Connection) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let conn = self
            .db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))?;
        work(&conn)
    }
}

/// Create the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let items = Router::new()
        .route("/api/items", get(http::list_items).post(http::create_item))
        .route(
            "/api/items/{id}",
            get(http::get_item)
                .put(http::update_item)
                .delete(http::delete_item),
        )
        .route("/api/items/{id}/done", post(http::complete_item))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Router::new()
        .merge(items)
        .route("/api/login", post(http::login))
        .route("/api/logout", post(http::logout))
        .route("/api/health", get(http::health))
        .with_state(state)
}

/// Start the server
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<(), Box<dyn Error>> {
    let gated = state.requires_login();
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("event=server_listen module=server status=ok addr={addr} login_required={gated}");
    axum::serve(listener, app).await?;
    Ok(())
}
