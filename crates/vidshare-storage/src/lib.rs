//! Local filesystem store for uploads and renditions.

pub mod error;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use store::MediaStore;
