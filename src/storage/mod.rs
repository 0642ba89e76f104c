//! Storage module for persisting harvested items
//!
//! Every item lives in its own directory named by its identifier, holding a
//! JSON metadata document and one file per downloaded page image. The
//! presence of that directory is what marks an item as already harvested.

mod fs;
mod traits;

pub use fs::FsItemStore;
pub use traits::{ItemStore, StorageError, StorageResult};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key holding the page count in a metadata document
pub const PAGES_KEY: &str = "pages";

/// Key holding the source URL in a metadata document
pub const URL_KEY: &str = "url";

/// Key holding the UTC scrape timestamp in a metadata document
pub const SCRAPED_AT_KEY: &str = "datetime_scraped_at";

/// Metadata mapping of one item
///
/// String keys to heterogeneous JSON values. Serialized as a plain JSON
/// object; `pages` is the only key the harvester itself depends on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemMetadata(Map<String, Value>);

impl ItemMetadata {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Inserts or replaces a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns a field, if present
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Page count, if present and a positive integer
    pub fn pages(&self) -> Option<u32> {
        self.0
            .get(PAGES_KEY)
            .and_then(Value::as_u64)
            .filter(|pages| *pages > 0)
            .and_then(|pages| u32::try_from(pages).ok())
    }

    /// URL the metadata was extracted from
    pub fn url(&self) -> Option<&str> {
        self.0.get(URL_KEY).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
