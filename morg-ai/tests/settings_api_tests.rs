//! Integration tests for the settings API
//!
//! POST /api/settings/:key writes the database, mirrors the key to TOML and
//! rebuilds the analyzer.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use helpers::*;
use morg_common::config::{SearchProviderKind, TomlConfig};
use serde_json::json;
use tower::ServiceExt;

fn settings_request(key: &str, value: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/api/settings/{}", key))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "value": value }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_set_key_updates_database_and_toml() {
    let app = create_test_app().await;
    let toml_dir = tempfile::tempdir().unwrap();
    let toml_path = toml_dir.path().join("morg-ai.toml");
    let state = app.state.clone().with_config_path(Some(toml_path.clone()));
    let router = morg_ai::build_router(state);

    let response = router
        .oneshot(settings_request("google_api_key", "  key-123  "))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("configured successfully"));

    let stored = morg_ai::db::settings::get_setting::<String>(&app.pool, "google_api_key")
        .await
        .unwrap();
    assert_eq!(stored, Some("key-123".to_string()));

    let toml = morg_common::config::load_toml_config(&toml_path).unwrap();
    assert_eq!(toml.google_api_key.as_deref(), Some("key-123"));
}

#[tokio::test]
async fn test_set_key_rejects_empty_value() {
    let app = create_test_app().await;

    let response = app
        .router
        .oneshot(settings_request("gemini_api_key", "   "))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        morg_ai::db::settings::get_setting::<String>(&app.pool, "gemini_api_key")
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_set_unknown_key_rejected() {
    let app = create_test_app().await;

    let response = app
        .router
        .oneshot(settings_request("root_folder", "/tmp"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Unknown setting"));
}

#[tokio::test]
async fn test_setting_keys_reloads_analyzer() {
    let mut config = TomlConfig::default();
    config.search.provider = SearchProviderKind::Google;
    let app = create_test_app_with(GOOD_REPLY, config).await;
    assert_eq!(app.state.analyzer().await.search_provider_name(), "stub");

    let response = app
        .router
        .clone()
        .oneshot(settings_request("google_api_key", "key"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // engine id still missing: provider degrades to disabled
    assert_eq!(app.state.analyzer().await.search_provider_name(), "disabled");

    let response = app
        .router
        .oneshot(settings_request("google_cse_id", "cx"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.state.analyzer().await.search_provider_name(), "google");
}
