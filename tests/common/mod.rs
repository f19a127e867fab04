#![allow(dead_code)]

use std::path::Path;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use http_body_util::BodyExt;
use tempfile::TempDir;

use chunkdrop::checksum::crc32;
use chunkdrop::common::AppConfig;
use chunkdrop::protocol::ChunkMeta;
use chunkdrop::server::{routes, AppState};

pub fn setup_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

//============
// App Factory
//============
pub fn create_test_app(base_dir: &Path) -> (Router, AppState) {
    let config = AppConfig::default();
    let state = AppState::new(base_dir.to_path_buf(), &config);
    let app = routes::create_router(&state, config.server.body_limit);
    (app, state)
}

pub fn create_read_only_test_app(base_dir: &Path) -> (Router, AppState) {
    let mut config = AppConfig::default();
    config.server.read_only = true;
    let state = AppState::new(base_dir.to_path_buf(), &config);
    let app = routes::create_router(&state, config.server.body_limit);
    (app, state)
}

//==============
// Meta Builders
//==============
pub fn chunk_meta(
    file_name: &str,
    chunk_index: u64,
    total_chunks: u64,
    total_size: u64,
    payload: &[u8],
) -> ChunkMeta {
    ChunkMeta {
        file_name: file_name.to_string(),
        chunk_index,
        total_chunks,
        chunk_size: payload.len() as u64,
        total_size,
        chunk_checksum: crc32(payload),
        file_checksum: 0,
    }
}

//=================
// Request Builders
//=================
pub fn build_chunk_request(uri: &str, meta_json: &str, chunk_data: &[u8]) -> Request<Body> {
    let boundary = "----WebKitFormBoundary7MA4YWxkTrZu0gW";
    let mut body = Vec::new();

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"meta\"\r\n\r\n");
    body.extend_from_slice(meta_json.as_bytes());
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"chunk\"\r\n");
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(chunk_data);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("Failed to build multipart request")
}

pub fn build_meta_request(uri: &str, meta: &ChunkMeta, chunk_data: &[u8]) -> Request<Body> {
    let meta_json = serde_json::to_string(meta).expect("Failed to serialize meta");
    build_chunk_request(uri, &meta_json, chunk_data)
}

//==================
// Response Helpers
//==================
pub async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Response body is not JSON")
}
