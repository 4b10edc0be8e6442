//! Route-level integration tests: upload validation, error shapes,
//! and the health endpoint.

mod helpers;

use axum::http::StatusCode;
use tower::ServiceExt;

use helpers::*;

#[tokio::test]
async fn health_reports_module_and_sessions() {
    let t = test_app();
    let response = t.app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "vocalise-web");
    assert!(json["version"].is_string());
    assert_eq!(json["active_sessions"], 0);
}

#[tokio::test]
async fn upload_returns_session_id() {
    let t = test_app();
    let wav = sine_wav(440.0, 5.0, 22050);

    let response = t
        .app
        .clone()
        .oneshot(upload_request("song.wav", &wav))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["filename"], "song.wav");
    let session_id: uuid::Uuid = json["session_id"].as_str().unwrap().parse().unwrap();
    assert!(t.state.store.get(session_id).await.is_some());
}

#[tokio::test]
async fn upload_unknown_extension_is_unsupported_media() {
    let t = test_app();
    let response = t
        .app
        .oneshot(upload_request("notes.txt", b"not audio at all"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let json = json_body(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "unsupported_media");
    assert!(t.state.store.is_empty().await, "no session on failure");
}

#[tokio::test]
async fn upload_renamed_text_file_is_rejected_by_sniffing() {
    let t = test_app();
    let body = vec![b'x'; 4096];

    let response = t
        .app
        .oneshot(upload_request("fake.wav", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let json = json_body(response).await;
    assert_eq!(json["error"], "unsupported_media");
    assert!(t.state.store.is_empty().await);
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large_and_creates_no_session() {
    // 4 KiB limit, ~200 KiB upload.
    let t = test_app_with_limit(4 * 1024);
    let wav = sine_wav(440.0, 5.0, 22050);
    assert!(wav.len() as u64 > 4 * 1024);

    let response = t
        .app
        .clone()
        .oneshot(upload_request("song.wav", &wav))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let json = json_body(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "payload_too_large");
    assert!(t.state.store.is_empty().await, "no session on failure");

    // The partial file was rolled back too.
    let uploads = std::fs::read_dir(&t.state.settings.upload_dir).unwrap().count();
    assert_eq!(uploads, 0);
}

#[tokio::test]
async fn analyze_unknown_session_is_not_found() {
    let t = test_app();
    let response = t
        .app
        .oneshot(post(
            "/api/analyze-song/00000000-0000-0000-0000-000000000000",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = json_body(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "not_found");
    assert!(json["detail"].is_string());
}

#[tokio::test]
async fn select_before_analyze_is_invalid_state() {
    let t = test_app();
    let wav = sine_wav(440.0, 5.0, 22050);
    let response = t
        .app
        .clone()
        .oneshot(upload_request("song.wav", &wav))
        .await
        .unwrap();
    let session_id = json_body(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = t
        .app
        .oneshot(post(&format!("/api/select-section/{session_id}/0")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error"], "invalid_state");
}

#[tokio::test]
async fn record_with_missing_fields_is_bad_request() {
    let t = test_app();
    let (content_type, body) = MultipartBuilder::new()
        .text("session_id", "00000000-0000-0000-0000-000000000000")
        .build();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/analyze-recording")
        .header(axum::http::header::CONTENT_TYPE, content_type)
        .body(axum::body::Body::from(body))
        .unwrap();

    let response = t.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "bad_request");
}

#[tokio::test]
async fn session_reset_removes_session_and_files() {
    let t = test_app();
    let wav = sine_wav(440.0, 5.0, 22050);
    let response = t
        .app
        .clone()
        .oneshot(upload_request("song.wav", &wav))
        .await
        .unwrap();
    let session_id = json_body(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(t.state.store.len().await, 1);

    let response = t
        .app
        .clone()
        .oneshot(delete(&format!("/api/session/{session_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(t.state.store.is_empty().await);
    let uploads = std::fs::read_dir(&t.state.settings.upload_dir).unwrap().count();
    assert_eq!(uploads, 0);

    // Reset is idempotent.
    let response = t
        .app
        .oneshot(delete(&format!("/api/session/{session_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
