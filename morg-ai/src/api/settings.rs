//! Settings API endpoint
//!
//! `POST /api/settings/:key` stores a search or model API key, mirrors it to
//! the TOML file and rebuilds the analyzer so the key takes effect at once.

use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Request payload: `{"value": "..."}`
#[derive(Debug, Deserialize)]
pub struct SetSettingRequest {
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct SetSettingResponse {
    /// Whether the operation succeeded
    pub success: bool,
    /// Human-readable status message
    pub message: String,
}

/// POST /api/settings/:key
///
/// **Errors:**
/// - 400: unknown key, or empty/whitespace value
/// - 500: database write failure
///
/// TOML sync and analyzer reload failures only log warnings.
pub async fn set_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<SetSettingRequest>,
) -> ApiResult<Json<SetSettingResponse>> {
    if !crate::db::settings::is_known_secret(&key) {
        return Err(ApiError::BadRequest(format!(
            "Unknown setting '{}' (expected one of: {})",
            key,
            crate::db::settings::SECRET_KEYS.join(", ")
        )));
    }

    if !crate::config::is_valid_key(&payload.value) {
        return Err(ApiError::BadRequest(format!(
            "{} cannot be empty or whitespace-only",
            key
        )));
    }
    let value = payload.value.trim().to_string();

    crate::db::settings::set_setting(&state.db, &key, &value)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to save {} to database: {}", key, e)))?;
    info!("{} configured via API", key);

    if let Some(toml_path) = &state.config_path {
        let mut settings = HashMap::new();
        settings.insert(key.clone(), value);
        if let Err(e) = crate::config::sync_settings_to_toml(settings, toml_path).await {
            warn!("TOML sync failed (database write succeeded): {}", e);
        }
    }

    if let Err(e) = state.reload_analyzer().await {
        warn!("Analyzer reload failed after setting {}: {}", key, e);
    }

    Ok(Json(SetSettingResponse {
        success: true,
        message: format!("{} configured successfully", key),
    }))
}

pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings/:key", post(set_setting))
}
