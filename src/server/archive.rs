// Archive bundling - POST /api/create-zip
//
// Bundles a client-supplied list of artifact names into one zip via the
// system archiver. Names are resolved through the artifact store first, so
// only files that really exist inside the root end up in the archive.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::acquire::invoker::run_with_deadline;
use crate::acquire::parser::stderr_tail;

const BUNDLES_SUBDIR: &str = "bundles";
const ZIP_DEADLINE: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipRequest {
    pub video_files: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ZipResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn handle(
    State(state): State<AppState>,
    Json(req): Json<ZipRequest>,
) -> (StatusCode, Json<ZipResponse>) {
    let requested = req.video_files.unwrap_or_default();
    if requested.is_empty() {
        return (StatusCode::BAD_REQUEST, failure("no video files specified"));
    }

    // Keep only names that resolve to real files under the root.
    let existing: Vec<_> = requested
        .iter()
        .filter_map(|name| state.artifacts.resolve_relative(name).ok())
        .collect();
    if existing.is_empty() {
        return (StatusCode::NOT_FOUND, failure("no existing video files found"));
    }

    let bundles_dir = state.artifacts.root().join(BUNDLES_SUBDIR);
    if let Err(err) = tokio::fs::create_dir_all(&bundles_dir).await {
        tracing::error!(target: "medisave::archive", error = %err, "failed to create bundles dir");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            failure("failed to create zip file"),
        );
    }

    let filename = format!(
        "medisave-{}.zip",
        time::OffsetDateTime::now_utc().unix_timestamp()
    );
    let zip_path = bundles_dir.join(&filename);

    // -j strips directories so the archive holds bare filenames only.
    let mut args = vec!["-j".to_string(), zip_path.to_string_lossy().into_owned()];
    args.extend(existing.iter().map(|p| p.to_string_lossy().into_owned()));

    match run_with_deadline("zip", &args, ZIP_DEADLINE).await {
        Ok(out) if out.exit_code == Some(0) => {
            tracing::info!(target: "medisave::archive", %filename, files = existing.len(), "bundle created");
            (
                StatusCode::OK,
                Json(ZipResponse {
                    success: true,
                    zip_url: Some(format!("/api/downloads/{}/{}", BUNDLES_SUBDIR, filename)),
                    filename: Some(filename),
                    error: None,
                }),
            )
        }
        Ok(out) => {
            tracing::error!(
                target: "medisave::archive",
                exit_code = ?out.exit_code,
                diagnostic = %stderr_tail(&out.stderr),
                "archiver failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                failure("failed to create zip file"),
            )
        }
        Err(err) => {
            tracing::error!(target: "medisave::archive", error = %err, "archiver did not run");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                failure("failed to create zip file"),
            )
        }
    }
}

fn failure(error: &str) -> Json<ZipResponse> {
    Json(ZipResponse {
        success: false,
        error: Some(error.to_string()),
        ..Default::default()
    })
}
