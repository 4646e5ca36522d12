// Acquisition endpoint - POST /api/download
//
// One independent task per request; the coordinator runs its two tiers
// strictly sequentially inside it and returns exactly one outcome.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::acquire::{AcquisitionOutcome, ArtifactStore, FailureKind};

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn handle(
    State(state): State<AppState>,
    Json(req): Json<DownloadRequest>,
) -> (StatusCode, Json<DownloadResponse>) {
    let url = match req.url.filter(|u| is_valid_source_url(u)) {
        Some(url) => url,
        None => return (StatusCode::BAD_REQUEST, failure("a valid absolute URL is required")),
    };

    tracing::info!(target: "medisave::server", url = %url, "acquisition requested");
    let outcome = state.coordinator.acquire(&url).await;
    respond(outcome, &state.artifacts)
}

/// Syntactic check only: absolute http(s) URL.
fn is_valid_source_url(url: &str) -> bool {
    match reqwest::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Map a core outcome onto the wire contract. The artifact's absolute
/// location never leaves the server; only the root-relative reference does.
fn respond(outcome: AcquisitionOutcome, artifacts: &ArtifactStore) -> (StatusCode, Json<DownloadResponse>) {
    match outcome {
        AcquisitionOutcome::LocalFile { path, title } => match artifacts.public_path(&path) {
            Some(rel) => (
                StatusCode::OK,
                Json(DownloadResponse {
                    success: true,
                    title: Some(title),
                    file_url: Some(format!("/api/downloads/{}", rel)),
                    is_stream: Some(false),
                    error: None,
                }),
            ),
            None => (
                StatusCode::INTERNAL_SERVER_ERROR,
                failure("failed to map produced file into the artifacts root"),
            ),
        },
        AcquisitionOutcome::RemoteStream { url, title } => (
            StatusCode::OK,
            Json(DownloadResponse {
                success: true,
                title,
                file_url: Some(url),
                is_stream: Some(true),
                error: None,
            }),
        ),
        AcquisitionOutcome::Failed { kind, diagnostic } => {
            let status = match kind {
                FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                FailureKind::Launch | FailureKind::Extraction => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (status, failure(&diagnostic))
        }
    }
}

fn failure(error: &str) -> Json<DownloadResponse> {
    Json(DownloadResponse {
        success: false,
        error: Some(error.to_string()),
        ..Default::default()
    })
}
