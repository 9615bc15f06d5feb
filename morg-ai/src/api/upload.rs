//! Upload endpoint
//!
//! `POST /upload` takes a multipart `file` part plus optional `creator`,
//! `model`, `file_type` and `enrich` text parts. With all three record
//! fields the upload is stored directly; with none of them the analysis
//! pipeline runs and its report is returned for confirmation.

use crate::extractors::MeshFormat;
use crate::services::AnalysisReport;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use morg_common::db::NewModelRecord;
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

/// Fields collected from the multipart body
#[derive(Debug, Default)]
struct UploadForm {
    /// Client filename and content of the `file` part
    file: Option<(String, Vec<u8>)>,
    creator: Option<String>,
    model: Option<String>,
    file_type: Option<String>,
    enrich: Option<bool>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error("Invalid multipart body", e))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| multipart_error("Failed to read file part", e))?;
                    form.file = Some((filename, bytes.to_vec()));
                }
                "creator" | "model" | "file_type" | "enrich" => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| multipart_error(&format!("Failed to read '{}'", name), e))?;
                    let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
                    match name.as_str() {
                        "creator" => form.creator = value,
                        "model" => form.model = value,
                        "file_type" => form.file_type = value,
                        _ => form.enrich = value.as_deref().map(parse_flag),
                    }
                }
                other => {
                    tracing::debug!(field = other, "Ignoring unknown multipart field");
                }
            }
        }

        Ok(form)
    }
}

/// Keep the body-limit status; everything else is a malformed request
fn multipart_error(context: &str, e: MultipartError) -> ApiError {
    let message = format!("{}: {}", context, e.body_text());
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(message)
    } else {
        ApiError::BadRequest(message)
    }
}

/// HTML-form style boolean
fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Reduce a client filename to a safe single path component
///
/// Directory parts are dropped and anything outside `[A-Za-z0-9._-]`
/// becomes `_`. Returns `None` when nothing usable remains.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_' || c == '.') {
        None
    } else {
        Some(cleaned)
    }
}

/// Analysis result returned for confirmation
#[derive(Debug, Serialize)]
pub struct UploadAnalysisResponse {
    pub filename: String,
    #[serde(flatten)]
    pub report: AnalysisReport,
}

/// POST /upload
pub async fn upload_file(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Response> {
    let form = UploadForm::read(multipart).await?;

    let (client_name, bytes) = form
        .file
        .ok_or_else(|| ApiError::BadRequest("No file part in the request".to_string()))?;

    if client_name.trim().is_empty() {
        return Err(ApiError::BadRequest("No selected file".to_string()));
    }

    let filename = sanitize_filename(&client_name)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid filename: {}", client_name)))?;

    if MeshFormat::from_path(Path::new(&filename)).is_none() {
        return Err(ApiError::BadRequest(format!(
            "Unsupported file type: {} (expected .stl, .obj or .3mf)",
            client_name
        )));
    }

    let direct = match (form.creator, form.model, form.file_type) {
        (Some(creator), Some(model), Some(file_type)) => Some(NewModelRecord {
            creator,
            model,
            file_type,
            filename: filename.clone(),
            original_filename: Some(client_name.clone()).filter(|n| *n != filename),
        }),
        (None, None, None) => None,
        _ => {
            return Err(ApiError::BadRequest("Missing directory information".to_string()));
        }
    };

    // validate before touching disk
    let direct = direct.map(NewModelRecord::validate).transpose()?;

    tokio::fs::create_dir_all(&state.uploads_dir).await?;
    let saved_path = state.uploads_dir.join(&filename);
    tokio::fs::write(&saved_path, &bytes).await?;
    info!(
        file = %filename,
        bytes = bytes.len(),
        path = %saved_path.display(),
        "Upload saved"
    );

    if let Some(record) = direct {
        let id = crate::db::records::insert(&state.db, &record).await?;
        return Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": "File successfully uploaded",
                "id": id,
            })),
        )
            .into_response());
    }

    let analyzer = state.analyzer().await;
    let enrich = form.enrich.unwrap_or_else(|| analyzer.enrich_with_web());
    let report = analyzer.analyze_with(&saved_path, enrich).await.map_err(|e| {
        warn!(file = %filename, error = %e, "Analysis failed");
        ApiError::from(e)
    })?;

    Ok(Json(UploadAnalysisResponse { filename, report }).into_response())
}

pub fn upload_routes() -> Router<AppState> {
    Router::new().route("/upload", post(upload_file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd.stl").as_deref(), Some("passwd.stl"));
        assert_eq!(sanitize_filename("C:\\models\\cube.obj").as_deref(), Some("cube.obj"));
    }

    #[test]
    fn test_sanitize_replaces_odd_characters() {
        assert_eq!(
            sanitize_filename("dragon bust (v2).stl").as_deref(),
            Some("dragon_bust__v2_.stl")
        );
        assert_eq!(sanitize_filename(".hidden.3mf").as_deref(), Some("hidden.3mf"));
    }

    #[test]
    fn test_sanitize_rejects_empty_results() {
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename("../"), None);
        assert_eq!(sanitize_filename("..."), None);
        assert_eq!(sanitize_filename("???"), None);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("on"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
    }
}
