//! Health check handlers.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check endpoint: storage directories and the encoder binary
/// must be present before accepting uploads.
pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let storage_ready = state.store.upload_dir().is_dir() && state.store.video_dir().is_dir();
    let ffmpeg_ready = vidshare_media::check_ffmpeg().is_ok();

    Json(serde_json::json!({
        "status": if storage_ready && ffmpeg_ready { "ready" } else { "not_ready" },
        "storage": storage_ready,
        "ffmpeg": ffmpeg_ready,
    }))
}
