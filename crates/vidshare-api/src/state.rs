//! Application state.

use std::sync::Arc;

use vidshare_scheduler::TranscodeScheduler;
use vidshare_storage::MediaStore;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: MediaStore,
    pub scheduler: Arc<TranscodeScheduler>,
}

impl AppState {
    pub fn new(config: ApiConfig, store: MediaStore, scheduler: Arc<TranscodeScheduler>) -> Self {
        Self {
            config,
            store,
            scheduler,
        }
    }
}
