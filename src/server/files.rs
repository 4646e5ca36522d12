// Artifact serving - GET /api/downloads/{*filename}
//
// The relative path comes straight from the client, so it is validated by
// the artifact store before any filesystem access. Nothing here is cached:
// artifacts are ephemeral and keyed purely by filesystem presence.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tokio_util::io::ReaderStream;

use super::AppState;
use crate::acquire::ResolveError;

pub async fn handle(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    let path = match state.artifacts.resolve_relative(&filename) {
        Ok(path) => path,
        Err(ResolveError::Unsafe) => {
            tracing::warn!(target: "medisave::server", filename = %filename, "rejected unsafe artifact path");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid file path" })),
            )
                .into_response();
        }
        Err(ResolveError::NotFound) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "file not found" })),
            )
                .into_response();
        }
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "file not found" })),
            )
                .into_response();
        }
    };
    let length = file.metadata().await.ok().map(|m| m.len());

    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&basename))
        .header(header::CACHE_CONTROL, "no-store, no-cache, must-revalidate")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", basename),
        );
    if let Some(length) = length {
        response = response.header(header::CONTENT_LENGTH, length);
    }

    response
        .body(Body::from_stream(ReaderStream::new(file)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("zip") => "application/zip",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("webm") => "video/webm",
        _ => "video/mp4",
    }
}
