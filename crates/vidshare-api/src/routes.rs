//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::upload::upload_video;
use crate::handlers::videos::{delete_video, get_video, get_video_status, list_videos};
use crate::handlers::{health, ready};
use crate::middleware::{cors_layer, request_id, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/upload", post(upload_video))
        .route("/videos", get(list_videos))
        .route("/videos/:id", get(get_video))
        .route("/videos/:id", delete(delete_video))
        .route("/videos/:id/status", get(get_video_status));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .with_state(state)
}
