//! Filesystem item store
//!
//! Metadata documents are pretty-printed UTF-8 JSON (two-space indentation,
//! non-ASCII text kept as-is).

use crate::storage::traits::{ItemStore, StorageError, StorageResult};
use crate::storage::ItemMetadata;
use std::path::{Path, PathBuf};

/// Item store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsItemStore {
    root: PathBuf,
    meta_file_name: String,
}

impl FsItemStore {
    /// Opens a store, creating `root` if it does not exist
    ///
    /// # Arguments
    ///
    /// * `root` - Directory holding one sub-directory per item
    /// * `meta_file_name` - File name of the metadata document (e.g. `meta.json`)
    pub fn open(root: impl Into<PathBuf>, meta_file_name: &str) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StorageError::io(&root, e))?;

        Ok(Self {
            root,
            meta_file_name: meta_file_name.to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta_file_name(&self) -> &str {
        &self.meta_file_name
    }

    fn ensure_dir(&self, id: u64) -> StorageResult<PathBuf> {
        let dir = self.item_dir(id);
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        Ok(dir)
    }
}

impl ItemStore for FsItemStore {
    fn item_dir(&self, id: u64) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn save_metadata(&self, id: u64, metadata: &ItemMetadata) -> StorageResult<PathBuf> {
        let dir = self.ensure_dir(id)?;
        let path = dir.join(&self.meta_file_name);

        let json = serde_json::to_string_pretty(metadata)?;
        std::fs::write(&path, json).map_err(|e| StorageError::io(&path, e))?;

        tracing::debug!("Saved metadata for #{} to {}", id, path.display());
        Ok(dir)
    }

    fn save_page(&self, id: u64, file_name: &str, bytes: &[u8]) -> StorageResult<PathBuf> {
        if !is_plain_file_name(file_name) || file_name == self.meta_file_name {
            return Err(StorageError::InvalidFileName(file_name.to_string()));
        }

        let dir = self.ensure_dir(id)?;
        let path = dir.join(file_name);
        std::fs::write(&path, bytes).map_err(|e| StorageError::io(&path, e))?;
        Ok(path)
    }
}

/// A single path component that cannot escape the item directory
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PAGES_KEY;
    use tempfile::TempDir;

    fn create_store() -> (TempDir, FsItemStore) {
        let temp = TempDir::new().unwrap();
        let store = FsItemStore::open(temp.path().join("catalog"), "meta.json").unwrap();
        (temp, store)
    }

    #[test]
    fn test_open_creates_root() {
        let (_temp, store) = create_store();
        assert!(store.root().is_dir());
    }

    #[test]
    fn test_exists_follows_directory() {
        let (_temp, store) = create_store();
        assert!(!store.exists(42));

        std::fs::create_dir_all(store.item_dir(42)).unwrap();
        assert!(store.exists(42));
    }

    #[test]
    fn test_metadata_written_readable() {
        let (_temp, store) = create_store();
        let mut meta = ItemMetadata::new();
        meta.insert(PAGES_KEY, 3);
        meta.insert("title", "東方 ポスター");

        let dir = store.save_metadata(42, &meta).unwrap();
        assert_eq!(dir, store.item_dir(42));

        let text = std::fs::read_to_string(dir.join("meta.json")).unwrap();
        assert!(text.contains("東方 ポスター"), "non-ASCII must not be escaped");
        assert!(text.contains("\n  \""), "expected two-space indentation");

        let back: ItemMetadata = serde_json::from_str(&text).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_save_page() {
        let (_temp, store) = create_store();
        let path = store.save_page(7, "1.jpg", b"jpeg bytes").unwrap();
        assert_eq!(path, store.item_dir(7).join("1.jpg"));
        assert_eq!(std::fs::read(path).unwrap(), b"jpeg bytes");
    }

    #[test]
    fn test_save_page_rejects_escaping_names() {
        let (_temp, store) = create_store();
        for name in ["", "..", "../1.jpg", "a/b.jpg", "meta.json"] {
            assert!(
                matches!(
                    store.save_page(7, name, b"x"),
                    Err(StorageError::InvalidFileName(_))
                ),
                "accepted {:?}",
                name
            );
        }
    }
}
