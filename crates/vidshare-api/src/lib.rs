//! Axum HTTP API server.
//!
//! Thin glue around the transcode pipeline:
//! - multipart upload intake (assigns a source id, stores the file,
//!   submits the transcode job, returns immediately)
//! - playback resolution and streaming of encoded renditions
//! - job status queries against the scheduler's registry
//! - health endpoints and request middleware

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
