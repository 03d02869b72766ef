//! Upload intake handler.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::info;

use vidshare_models::SourceId;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Upload response.
#[derive(Serialize)]
pub struct UploadResponse {
    pub id: SourceId,
}

/// Accept a video upload and submit it for transcoding.
///
/// Responds as soon as the file is stored and the job is queued; the
/// encodes run off the request path. Clients poll the status endpoint
/// or just try playback.
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("video") {
            continue;
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read upload: {e}")))?;
        if data.is_empty() {
            return Err(ApiError::bad_request("empty upload"));
        }

        let source_id = SourceId::generate();
        let input_path = state.store.save_upload(&source_id, &data).await?;

        info!(source_id = %source_id, bytes = data.len(), "Upload accepted");
        state.scheduler.submit(source_id.clone(), input_path).await?;

        return Ok((StatusCode::ACCEPTED, Json(UploadResponse { id: source_id })));
    }

    Err(ApiError::bad_request("missing 'video' field"))
}
