//! Playback and video management handlers.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use vidshare_models::{RenditionSpec, SourceId, TaskState};
use vidshare_scheduler::JobStatus;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Playback query params.
#[derive(Deserialize)]
pub struct PlaybackQuery {
    /// Rendition name; defaults to the highest quality.
    pub rendition: Option<String>,
}

/// Resolve and stream one rendition of a video.
///
/// Availability is decided per requested rendition, not by the default
/// file alone, so a viewer asking for "low" can still play it when the
/// high-quality encode failed.
pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PlaybackQuery>,
) -> ApiResult<Response> {
    let source_id = SourceId::parse(&id)?;

    let spec = match query.rendition.as_deref() {
        None => RenditionSpec::default_rendition(),
        Some(name) => RenditionSpec::by_name(name)
            .ok_or_else(|| ApiError::bad_request(format!("unknown rendition '{name}'")))?,
    };

    let path = state.store.output_path(&source_id, spec);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("rendition not available"))?;
    let len = file.metadata().await.map(|m| m.len()).ok();

    let stream = ReaderStream::new(file);
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4");
    if let Some(len) = len {
        response = response.header(header::CONTENT_LENGTH, len);
    }

    response
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Per-rendition status entry.
#[derive(Serialize)]
pub struct RenditionStatus {
    pub rendition: String,
    pub state: TaskState,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Job status response.
#[derive(Serialize)]
pub struct StatusResponse {
    pub id: String,
    pub complete: bool,
    pub renditions: Vec<RenditionStatus>,
}

/// Report per-rendition transcode status for a source.
///
/// Uses the scheduler's registry when the job is known to this process;
/// after a restart the registry is empty, so availability falls back to
/// probing the rendition files on disk.
pub async fn get_video_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let source_id = SourceId::parse(&id)?;

    if let Some(status) = state.scheduler.registry().get(&source_id).await {
        return Ok(Json(registry_status(&state, &source_id, status)));
    }

    // Unknown to the registry: report what the filesystem has.
    let renditions: Vec<RenditionStatus> = RenditionSpec::ladder()
        .iter()
        .map(|spec| {
            let available = state.store.rendition_available(&source_id, spec);
            RenditionStatus {
                rendition: spec.name.to_string(),
                state: if available {
                    TaskState::Succeeded
                } else {
                    TaskState::Failed
                },
                available,
                error: None,
            }
        })
        .collect();

    if renditions.iter().all(|r| !r.available) {
        return Err(ApiError::not_found("unknown video"));
    }

    Ok(Json(StatusResponse {
        id: source_id.to_string(),
        complete: true,
        renditions,
    }))
}

fn registry_status(state: &AppState, source_id: &SourceId, status: JobStatus) -> StatusResponse {
    let renditions = status
        .tasks
        .iter()
        .map(|task| {
            let available = RenditionSpec::by_name(&task.rendition)
                .map(|spec| state.store.rendition_available(source_id, spec))
                .unwrap_or(false);
            RenditionStatus {
                rendition: task.rendition.clone(),
                state: task.state,
                available,
                error: task.error.clone(),
            }
        })
        .collect();

    StatusResponse {
        id: source_id.to_string(),
        complete: status.is_complete(),
        renditions,
    }
}

/// Video listing response.
#[derive(Serialize)]
pub struct ListVideosResponse {
    pub videos: Vec<String>,
}

/// List sources with an available default rendition.
pub async fn list_videos(State(state): State<AppState>) -> ApiResult<Json<ListVideosResponse>> {
    let videos = state
        .store
        .list_available()
        .await?
        .into_iter()
        .map(|id| id.to_string())
        .collect();
    Ok(Json(ListVideosResponse { videos }))
}

/// Delete response.
#[derive(Serialize)]
pub struct DeleteVideoResponse {
    pub success: bool,
    pub id: String,
    pub files_deleted: u32,
}

/// Delete a source's upload, renditions, and status record.
///
/// A job known only to the registry (submitted, nothing on disk yet)
/// still counts as existing: its record is dropped and the delete
/// succeeds rather than 404ing after silently discarding the status.
pub async fn delete_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteVideoResponse>> {
    let source_id = SourceId::parse(&id)?;

    let files_deleted = state.store.delete_source(&source_id).await?;
    let had_record = state
        .scheduler
        .registry()
        .remove(&source_id)
        .await
        .is_some();

    if files_deleted == 0 && !had_record {
        return Err(ApiError::not_found("unknown video"));
    }

    Ok(Json(DeleteVideoResponse {
        success: true,
        id: source_id.to_string(),
        files_deleted,
    }))
}
