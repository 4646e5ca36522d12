// HTTP surface - thin I/O wrappers around the acquisition core

pub mod archive;
pub mod download;
pub mod files;
pub mod proxy;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::acquire::{ArtifactStore, FallbackCoordinator, YtDlpInvoker};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<FallbackCoordinator<YtDlpInvoker>>,
    pub artifacts: ArtifactStore,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let artifacts = ArtifactStore::new(config.artifacts_root.clone());
        let invoker = YtDlpInvoker::new(config);
        Self {
            coordinator: Arc::new(FallbackCoordinator::new(invoker, artifacts.clone())),
            artifacts,
            http: reqwest::Client::new(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/download", post(download::handle))
        .route("/api/downloads/{*filename}", get(files::handle))
        .route("/api/proxy", get(proxy::handle))
        .route("/api/create-zip", post(archive::handle))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "version": env!("CARGO_PKG_VERSION") }))
}
