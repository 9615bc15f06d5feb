//! Model record endpoints
//!
//! Form handlers (`/confirm`, `/add`, `/delete/:id`) redirect back to the
//! manage page; `/api/records` serves the same data as JSON.

use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    response::{Html, Redirect},
    routing::{get, post},
    Form, Json, Router,
};
use morg_common::db::{ModelRecord, NewModelRecord};
use serde::Deserialize;
use tracing::info;

const MANAGE_PATH: &str = "/manage";

/// Record fields as posted by an HTML form
///
/// Every field defaults to empty so missing inputs surface as validation
/// errors (400) rather than extractor rejections.
#[derive(Debug, Default, Deserialize)]
pub struct RecordForm {
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub original_filename: Option<String>,
}

impl From<RecordForm> for NewModelRecord {
    fn from(form: RecordForm) -> Self {
        NewModelRecord {
            creator: form.creator,
            model: form.model,
            file_type: form.file_type,
            filename: form.filename,
            original_filename: form.original_filename,
        }
    }
}

/// POST /confirm
///
/// Persists a prediction the user reviewed (and possibly edited).
pub async fn confirm_record(
    State(state): State<AppState>,
    Form(form): Form<RecordForm>,
) -> ApiResult<Redirect> {
    let id = crate::db::records::insert(&state.db, &NewModelRecord::from(form)).await?;
    info!(id, "Prediction confirmed");
    Ok(Redirect::to(MANAGE_PATH))
}

/// POST /add
pub async fn add_record(
    State(state): State<AppState>,
    Form(form): Form<RecordForm>,
) -> ApiResult<Redirect> {
    crate::db::records::insert(&state.db, &NewModelRecord::from(form)).await?;
    Ok(Redirect::to(MANAGE_PATH))
}

/// POST /delete/:id
///
/// Unknown ids are ignored; the redirect happens either way.
pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Redirect> {
    crate::db::records::delete(&state.db, id).await?;
    Ok(Redirect::to(MANAGE_PATH))
}

/// GET /manage
pub async fn manage_page(State(state): State<AppState>) -> ApiResult<Html<String>> {
    let records = crate::db::records::list(&state.db).await?;
    Ok(Html(super::manage::render_manage_page(&records)))
}

/// GET /api/records
pub async fn list_records(State(state): State<AppState>) -> ApiResult<Json<Vec<ModelRecord>>> {
    Ok(Json(crate::db::records::list(&state.db).await?))
}

/// GET /api/records/:id
pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ModelRecord>> {
    crate::db::records::get(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("model record {}", id)))
}

pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to(MANAGE_PATH) }))
        .route("/confirm", post(confirm_record))
        .route("/add", post(add_record))
        .route("/delete/:id", post(delete_record))
        .route("/manage", get(manage_page))
        .route("/api/records", get(list_records))
        .route("/api/records/:id", get(get_record))
}
