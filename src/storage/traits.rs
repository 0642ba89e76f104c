//! Storage traits and error types
//!
//! This module defines the trait interface for item stores and associated
//! error types.

use crate::storage::ItemMetadata;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for item store implementations
///
/// Shared by every concurrent scrape, so implementations must be
/// thread-safe. Each item directory is only ever written by the one scrape
/// handling that identifier.
pub trait ItemStore: Send + Sync {
    /// Directory an item is stored in
    fn item_dir(&self, id: u64) -> PathBuf;

    /// Returns true if the item directory already exists
    fn exists(&self, id: u64) -> bool {
        self.item_dir(id).exists()
    }

    /// Writes the metadata document, creating the item directory if needed
    ///
    /// # Returns
    ///
    /// The item directory
    fn save_metadata(&self, id: u64, metadata: &ItemMetadata) -> StorageResult<PathBuf>;

    /// Writes one page image under `file_name` in the item directory
    ///
    /// # Returns
    ///
    /// The path of the written file
    fn save_page(&self, id: u64, file_name: &str, bytes: &[u8]) -> StorageResult<PathBuf>;
}
