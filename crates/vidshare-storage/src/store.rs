//! Upload and rendition file layout.
//!
//! Uploads land in `<upload_dir>/<source_id>.mp4`; renditions are
//! written to `<video_dir>/<prefix><source_id>.mp4`. Both paths are
//! pure functions of the source id, so resubmitting a source overwrites
//! its previous files instead of accumulating stale ones.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use vidshare_models::{RenditionSpec, SourceId};

use crate::error::StorageResult;

/// Default directories, matching the original deployment layout.
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_VIDEO_DIR: &str = "static/videos";

/// Local filesystem store for source uploads and encoded renditions.
#[derive(Debug, Clone)]
pub struct MediaStore {
    upload_dir: PathBuf,
    video_dir: PathBuf,
}

impl MediaStore {
    /// Create a store rooted at the given directories.
    pub fn new(upload_dir: impl Into<PathBuf>, video_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            video_dir: video_dir.into(),
        }
    }

    /// Create a store from `UPLOAD_DIR` / `VIDEO_DIR` environment
    /// variables, with the original deployment defaults.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("UPLOAD_DIR").unwrap_or_else(|_| DEFAULT_UPLOAD_DIR.to_string()),
            std::env::var("VIDEO_DIR").unwrap_or_else(|_| DEFAULT_VIDEO_DIR.to_string()),
        )
    }

    /// Ensure both directories exist.
    pub async fn init(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.upload_dir).await?;
        fs::create_dir_all(&self.video_dir).await?;
        Ok(())
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn video_dir(&self) -> &Path {
        &self.video_dir
    }

    /// Where a source upload is stored.
    pub fn upload_path(&self, source_id: &SourceId) -> PathBuf {
        self.upload_dir.join(format!("{source_id}.mp4"))
    }

    /// Deterministic output path for one rendition of a source.
    pub fn output_path(&self, source_id: &SourceId, spec: &RenditionSpec) -> PathBuf {
        self.video_dir.join(spec.output_filename(source_id))
    }

    /// Persist an uploaded file and return its path.
    pub async fn save_upload(&self, source_id: &SourceId, data: &[u8]) -> StorageResult<PathBuf> {
        let path = self.upload_path(source_id);
        fs::write(&path, data).await?;
        debug!(source_id = %source_id, bytes = data.len(), "Saved upload");
        Ok(path)
    }

    /// Whether a rendition file exists for this source.
    pub fn rendition_available(&self, source_id: &SourceId, spec: &RenditionSpec) -> bool {
        self.output_path(source_id, spec).is_file()
    }

    /// Whether the default (highest quality) rendition exists.
    pub fn default_available(&self, source_id: &SourceId) -> bool {
        self.rendition_available(source_id, RenditionSpec::default_rendition())
    }

    /// List source ids with an available default rendition.
    ///
    /// Source ids are alphanumeric, so default-rendition files are
    /// exactly the `.mp4` files whose stem carries no prefix underscore.
    pub async fn list_available(&self) -> StorageResult<Vec<SourceId>> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.video_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("mp4") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(id) = SourceId::parse(stem) {
                ids.push(id);
            }
        }
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }

    /// Delete the upload and every rendition of a source. Returns the
    /// number of files removed.
    pub async fn delete_source(&self, source_id: &SourceId) -> StorageResult<u32> {
        let mut deleted = 0;

        if fs::remove_file(self.upload_path(source_id)).await.is_ok() {
            deleted += 1;
        }
        for spec in RenditionSpec::ladder() {
            if fs::remove_file(self.output_path(source_id, spec)).await.is_ok() {
                deleted += 1;
            }
        }

        debug!(source_id = %source_id, deleted, "Deleted source files");
        Ok(deleted)
    }
}
