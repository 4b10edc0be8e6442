//! Shared helpers for the HTTP integration tests.
#![allow(dead_code)]

use std::io::Cursor;

use axum::body::Body;
use axum::http::{header, Request};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use vocalise_web::config::Settings;
use vocalise_web::{build_router, AppState};

pub const BOUNDARY: &str = "vocalise-test-boundary";

/// Router plus the state behind it; keeps the temp storage alive.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    _dirs: TempDir,
}

pub fn test_app() -> TestApp {
    test_app_with_limit(100 * 1024 * 1024)
}

pub fn test_app_with_limit(max_upload_bytes: u64) -> TestApp {
    let dirs = TempDir::new().unwrap();
    let settings = Settings {
        bind_addr: "127.0.0.1:0".to_string(),
        upload_dir: dirs.path().join("uploads"),
        recording_dir: dirs.path().join("recordings"),
        max_upload_bytes,
        ..Settings::default()
    };
    settings.ensure_directories().unwrap();
    let state = AppState::new(settings);
    TestApp {
        app: build_router(state.clone()),
        state,
        _dirs: dirs,
    }
}

/// In-memory 16-bit mono WAV of a sine tone.
pub fn sine_wav(freq: f32, seconds: f32, sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let n = (seconds * sample_rate as f32) as usize;
        for i in 0..n {
            let s =
                0.8 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin();
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Hand-rolled multipart/form-data body builder.
#[derive(Default)]
pub struct MultipartBuilder {
    body: Vec<u8>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn build(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        (
            format!("multipart/form-data; boundary={BOUNDARY}"),
            self.body,
        )
    }
}

/// POST /api/upload-song request with one file field.
pub fn upload_request(filename: &str, bytes: &[u8]) -> Request<Body> {
    let (content_type, body) = MultipartBuilder::new()
        .file("file", filename, "audio/wav", bytes)
        .build();
    Request::builder()
        .method("POST")
        .uri("/api/upload-song")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}

/// POST /api/analyze-recording request.
pub fn recording_request(session_id: &str, section_id: u32, bytes: &[u8]) -> Request<Body> {
    let (content_type, body) = MultipartBuilder::new()
        .file("recording", "recording.wav", "audio/wav", bytes)
        .text("session_id", session_id)
        .text("section_id", &section_id.to_string())
        .build();
    Request::builder()
        .method("POST")
        .uri("/api/analyze-recording")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}

pub fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Collect a response body as JSON.
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
