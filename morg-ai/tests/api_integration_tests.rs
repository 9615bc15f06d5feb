//! Integration tests for morg-ai HTTP endpoints

mod helpers;

use axum::http::StatusCode;
use helpers::*;
use morg_common::config::TomlConfig;
use morg_common::db::NewModelRecord;
use tower::util::ServiceExt;

fn sample_record(creator: &str) -> NewModelRecord {
    NewModelRecord {
        creator: creator.to_string(),
        model: "Calibration Cube".to_string(),
        file_type: "stl".to_string(),
        filename: "cube.stl".to_string(),
        original_filename: None,
    }
}

// ============================================================================
// /health
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app().await;

    let response = app.router.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "morg-ai");
    assert_eq!(json["records"], 0);
    assert_eq!(json["search_provider"], "stub");
    assert_eq!(json["llm_backend"], "stub");
    assert_eq!(json["enrich_with_web"], true);
    assert!(json.get("last_error").is_none());
}

#[tokio::test]
async fn test_health_degraded_when_database_closed() {
    let app = create_test_app().await;
    app.pool.close().await;

    let response = app.router.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert!(json.get("records").is_none());
}

#[tokio::test]
async fn test_failed_request_is_reported_by_health() {
    let app = create_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&[Part::Text {
            name: "creator",
            value: "Nobody",
        }]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(app.router.oneshot(get_request("/health")).await.unwrap()).await;
    assert_eq!(json["last_error"], "No file part in the request");
}

// ============================================================================
// /upload
// ============================================================================

#[tokio::test]
async fn test_upload_without_file_part() {
    let app = create_test_app().await;

    let response = app
        .router
        .oneshot(upload_request(&[Part::Text {
            name: "model",
            value: "Cube",
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "No file part in the request");
}

#[tokio::test]
async fn test_upload_with_empty_filename() {
    let app = create_test_app().await;

    let response = app
        .router
        .oneshot(upload_request(&[Part::File {
            name: "file",
            filename: "",
            content: b"",
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No selected file");
}

#[tokio::test]
async fn test_upload_unsupported_extension() {
    let app = create_test_app().await;

    let response = app
        .router
        .oneshot(upload_request(&[Part::File {
            name: "file",
            filename: "notes.txt",
            content: b"hello",
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().starts_with("Unsupported file type"));
    assert!(!app.uploads.path().join("notes.txt").exists());
}

#[tokio::test]
async fn test_upload_with_partial_fields() {
    let app = create_test_app().await;
    let stl = cube_stl(1.0);

    let response = app
        .router
        .oneshot(upload_request(&[
            Part::File {
                name: "file",
                filename: "cube.stl",
                content: &stl,
            },
            Part::Text {
                name: "creator",
                value: "Makers Inc",
            },
            Part::Text {
                name: "model",
                value: "Cube",
            },
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing directory information");
    assert_eq!(morg_ai::db::records::count(&app.pool).await.unwrap(), 0);
}

#[tokio::test]
async fn test_upload_with_all_fields_persists_directly() {
    let app = create_test_app().await;
    let stl = cube_stl(1.0);

    let response = app
        .router
        .oneshot(upload_request(&[
            Part::File {
                name: "file",
                filename: "cube.stl",
                content: &stl,
            },
            Part::Text {
                name: "creator",
                value: "Makers Inc",
            },
            Part::Text {
                name: "model",
                value: "Cube",
            },
            Part::Text {
                name: "file_type",
                value: "stl",
            },
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["success"], "File successfully uploaded");
    let id = json["id"].as_i64().unwrap();

    let record = morg_ai::db::records::get(&app.pool, id).await.unwrap().unwrap();
    assert_eq!(record.creator, "Makers Inc");
    assert_eq!(record.filename, "cube.stl");
    assert_eq!(record.original_filename, None);
    assert_eq!(std::fs::read(app.uploads.path().join("cube.stl")).unwrap(), stl);
}

#[tokio::test]
async fn test_upload_runs_analysis() {
    let app = create_test_app().await;
    let stl = cube_stl(10.0);

    let response = app
        .router
        .oneshot(upload_request(&[Part::File {
            name: "file",
            filename: "calibration cube.stl",
            content: &stl,
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["filename"], "calibration_cube.stl");
    assert_eq!(json["metadata"]["num_triangles"], 12);
    assert_eq!(json["metadata"]["format"], "stl");
    assert!((json["metadata"]["volume"].as_f64().unwrap() - 1000.0).abs() < 1e-6);
    assert_eq!(
        json["web_context"],
        "Calibration Cube: Free test print by Makers Inc"
    );
    assert_eq!(json["prediction"]["creator"], "Makers Inc");
    assert_eq!(json["prediction"]["filetype"], "STL");

    // nothing is persisted until confirmation
    assert_eq!(morg_ai::db::records::count(&app.pool).await.unwrap(), 0);
    assert!(app.uploads.path().join("calibration_cube.stl").exists());
}

#[tokio::test]
async fn test_upload_enrich_opt_out() {
    let app = create_test_app().await;
    let stl = cube_stl(1.0);

    let response = app
        .router
        .oneshot(upload_request(&[
            Part::File {
                name: "file",
                filename: "cube.stl",
                content: &stl,
            },
            Part::Text {
                name: "enrich",
                value: "false",
            },
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["web_context"], "");
}

#[tokio::test]
async fn test_upload_enrich_opt_in_when_disabled_by_config() {
    let mut config = TomlConfig::default();
    config.search.enrich = false;
    let app = create_test_app_with(GOOD_REPLY, config).await;
    let stl = cube_stl(1.0);

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&[Part::File {
            name: "file",
            filename: "cube.stl",
            content: &stl,
        }]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["web_context"], "");

    let response = app
        .router
        .oneshot(upload_request(&[
            Part::File {
                name: "file",
                filename: "cube.stl",
                content: &stl,
            },
            Part::Text {
                name: "enrich",
                value: "1",
            },
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["web_context"],
        "Calibration Cube: Free test print by Makers Inc"
    );
}

#[tokio::test]
async fn test_upload_corrupt_mesh_is_server_error() {
    let app = create_test_app().await;

    let response = app
        .router
        .oneshot(upload_request(&[Part::File {
            name: "file",
            filename: "broken.stl",
            content: b"solid broken\nendsolid broken\n",
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Failed to parse STL: mesh contains no triangles");
    assert_eq!(json["code"], "ANALYSIS_FAILED");
}

#[tokio::test]
async fn test_upload_llm_without_json_is_server_error() {
    let app = create_test_app_with("I cannot tell.", TomlConfig::default()).await;
    let stl = cube_stl(1.0);

    let response = app
        .router
        .oneshot(upload_request(&[Part::File {
            name: "file",
            filename: "cube.stl",
            content: &stl,
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"],
        "LLM response contained no JSON object"
    );
}

#[tokio::test]
async fn test_upload_over_body_limit() {
    let mut config = TomlConfig::default();
    config.max_upload_bytes = 512;
    let app = create_test_app_with(GOOD_REPLY, config).await;
    let stl = cube_stl(1.0);

    let response = app
        .router
        .oneshot(upload_request(&[Part::File {
            name: "file",
            filename: "cube.stl",
            content: &stl,
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// ============================================================================
// Record CRUD
// ============================================================================

#[tokio::test]
async fn test_confirm_persists_and_redirects() {
    let app = create_test_app().await;

    let response = app
        .router
        .oneshot(form_request(
            "/confirm",
            "creator=Makers+Inc&model=Cube&file_type=STL&filename=cube.stl&original_filename=calibration_cube.stl",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/manage");

    let records = morg_ai::db::records::list(&app.pool).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].original_filename.as_deref(),
        Some("calibration_cube.stl")
    );
}

#[tokio::test]
async fn test_confirm_missing_field_is_bad_request() {
    let app = create_test_app().await;

    let response = app
        .router
        .oneshot(form_request("/confirm", "creator=Makers+Inc&model=Cube&file_type=STL"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid input: filename is required");
}

#[tokio::test]
async fn test_add_rejects_overlong_creator() {
    let app = create_test_app().await;
    let body = format!(
        "creator={}&model=Cube&file_type=stl&filename=cube.stl",
        "a".repeat(81)
    );

    let response = app.router.oneshot(form_request("/add", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_then_manage_lists_record() {
    let app = create_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(form_request(
            "/add",
            "creator=Makers+%26+Co&model=Cube&file_type=stl&filename=cube.stl",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app.router.oneshot(get_request("/manage")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Makers &amp; Co"));
    assert!(html.contains("action=\"/delete/1\""));
}

#[tokio::test]
async fn test_delete_existing_and_unknown() {
    let app = create_test_app().await;
    let id = morg_ai::db::records::insert(&app.pool, &sample_record("A"))
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(form_request(&format!("/delete/{}", id), ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(morg_ai::db::records::count(&app.pool).await.unwrap(), 0);

    let response = app
        .router
        .oneshot(form_request("/delete/999", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/manage");
}

#[tokio::test]
async fn test_api_records_json() {
    let app = create_test_app().await;
    let first = morg_ai::db::records::insert(&app.pool, &sample_record("A"))
        .await
        .unwrap();
    morg_ai::db::records::insert(&app.pool, &sample_record("B"))
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/records"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
    assert_eq!(json[0]["creator"], "A");

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/api/records/{}", first)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], first);

    let response = app
        .router
        .oneshot(get_request("/api/records/4242"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_root_redirects_to_manage() {
    let app = create_test_app().await;
    let response = app.router.oneshot(get_request("/")).await.unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(response.headers()["location"], "/manage");
}
