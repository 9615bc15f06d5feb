//! Liveness and pipeline diagnostics
//!
//! Reports which search provider and model backend the analyzer is running
//! with, so a key set through `/api/settings/:key` can be confirmed without
//! reading logs. A database that cannot be counted marks the service
//! `degraded`.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

const MODULE_NAME: &str = "morg-ai";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub git_hash: &'static str,
    pub uptime_seconds: u64,
    /// Stored model records; absent when the count query failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<i64>,
    pub search_provider: &'static str,
    pub llm_backend: &'static str,
    pub enrich_with_web: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;

    let records = match crate::db::records::count(&state.db).await {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not count records");
            None
        }
    };
    let analyzer = state.analyzer().await;

    Json(HealthResponse {
        status: if records.is_some() { "ok" } else { "degraded" },
        module: MODULE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        git_hash: env!("GIT_HASH"),
        uptime_seconds,
        records,
        search_provider: analyzer.search_provider_name(),
        llm_backend: analyzer.llm_backend_name(),
        enrich_with_web: analyzer.enrich_with_web(),
        last_error: state.last_error.read().await.clone(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
