//! Shared fixtures for morg-ai integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use morg_ai::services::{
    Analyzer, LlmBackend, LlmError, SearchError, SearchHit, SearchProvider,
};
use morg_ai::AppState;
use morg_common::config::TomlConfig;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub const BOUNDARY: &str = "morg-test-boundary";

/// Search provider returning one fixed hit
pub struct StubSearch;

#[async_trait]
impl SearchProvider for StubSearch {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchHit>, SearchError> {
        Ok(vec![SearchHit {
            title: "Calibration Cube".to_string(),
            snippet: "Free test print by Makers Inc".to_string(),
            url: Some("https://www.printables.com/model/1".to_string()),
        }])
    }
}

/// Model backend replying with canned text
pub struct StubLlm(pub &'static str);

#[async_trait]
impl LlmBackend for StubLlm {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Ok(self.0.to_string())
    }
}

pub const GOOD_REPLY: &str = r#"Based on the results:
{"creator": "Makers Inc", "filename": "calibration_cube.stl", "filetype": "STL"}"#;

/// In-memory database with the full schema
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    morg_common::db::create_schema(&pool)
        .await
        .expect("Failed to create schema");
    pool
}

pub struct TestApp {
    pub router: axum::Router,
    pub state: AppState,
    pub pool: SqlitePool,
    pub uploads: tempfile::TempDir,
}

/// App wired to stub search and model backends
pub async fn create_test_app_with(llm_reply: &'static str, config: TomlConfig) -> TestApp {
    let pool = test_pool().await;
    let uploads = tempfile::tempdir().expect("Failed to create temp dir");
    let analyzer = Analyzer::new(Arc::new(StubSearch), Arc::new(StubLlm(llm_reply)))
        .with_enrichment(config.search.enrich);

    let state = AppState::new(pool.clone(), analyzer, uploads.path().to_path_buf(), config);
    let router = morg_ai::build_router(state.clone());

    TestApp {
        router,
        state,
        pool,
        uploads,
    }
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(GOOD_REPLY, TomlConfig::default()).await
}

/// Binary STL of an axis-aligned cube with edge `size`
pub fn cube_stl(size: f32) -> Vec<u8> {
    let s = size;
    let v = [
        [0.0, 0.0, 0.0],
        [s, 0.0, 0.0],
        [s, s, 0.0],
        [0.0, s, 0.0],
        [0.0, 0.0, s],
        [s, 0.0, s],
        [s, s, s],
        [0.0, s, s],
    ];
    let faces: [[usize; 3]; 12] = [
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [1, 2, 6],
        [1, 6, 5],
        [2, 3, 7],
        [2, 7, 6],
        [3, 0, 4],
        [3, 4, 7],
    ];

    let mut out = vec![0u8; 80];
    out.extend_from_slice(&(faces.len() as u32).to_le_bytes());
    for face in faces {
        out.extend_from_slice(&[0u8; 12]);
        for idx in face {
            for coord in v[idx] {
                out.extend_from_slice(&(coord as f32).to_le_bytes());
            }
        }
        out.extend_from_slice(&[0u8; 2]);
    }
    out
}

pub enum Part<'a> {
    File {
        name: &'a str,
        filename: &'a str,
        content: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

/// Encode `multipart/form-data` by hand
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                name,
                filename,
                content,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(content);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    use http_body_util::BodyExt;
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: axum::response::Response) -> String {
    use http_body_util::BodyExt;
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
