//! morg-ai library interface
//!
//! Exposes the router, state and analysis services for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use chrono::{DateTime, Utc};
use morg_common::config::TomlConfig;
use services::Analyzer;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Current analysis pipeline; replaced when API keys change
    pub analyzer: Arc<RwLock<Arc<Analyzer>>>,
    /// Where uploaded files are written
    pub uploads_dir: PathBuf,
    /// Bootstrap configuration
    pub config: Arc<TomlConfig>,
    /// TOML file that receives settings written through the API
    pub config_path: Option<PathBuf>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, analyzer: Analyzer, uploads_dir: PathBuf, config: TomlConfig) -> Self {
        Self {
            db,
            analyzer: Arc::new(RwLock::new(Arc::new(analyzer))),
            uploads_dir,
            config: Arc::new(config),
            config_path: None,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Snapshot of the current analyzer
    pub async fn analyzer(&self) -> Arc<Analyzer> {
        self.analyzer.read().await.clone()
    }

    /// Rebuild the analyzer from config and the latest stored keys
    pub async fn reload_analyzer(&self) -> morg_common::Result<()> {
        let analyzer = config::build_analyzer(&self.db, &self.config).await?;
        *self.analyzer.write().await = Arc::new(analyzer);
        tracing::info!("Analyzer reloaded");
        Ok(())
    }
}

/// Copy the message of any failed response into `last_error`
async fn record_last_error(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if let Some(error::ErrorMessage(message)) = response.extensions().get::<error::ErrorMessage>() {
        *state.last_error.write().await = Some(message.clone());
    }
    response
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .merge(api::upload_routes())
        .merge(api::record_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .layer(middleware::from_fn_with_state(state.clone(), record_last_error))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
