//! Per-item scrape
//!
//! One [`ItemScraper::scrape`] call takes an item from nothing to a
//! directory holding its metadata document and page images:
//!
//! 1. Skip if the item directory already exists (no request is made)
//! 2. Fetch the metadata page and extract tags and page count
//! 3. Write the metadata document
//! 4. Fetch the first image page and extract the direct image URL
//! 5. Download the image set
//!
//! Any failure stops the item where it is; nothing written so far is
//! removed.

use crate::harvester::batch::ScrapeItem;
use crate::harvester::fetcher::RetryingFetcher;
use crate::harvester::images::ImageSetDownloader;
use crate::harvester::parser::{parse_image_link, parse_tags};
use crate::state::{ItemProgress, ItemState};
use crate::storage::ItemStore;
use crate::url::{resolve_url, CatalogUrls};
use crate::{HarvestError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Instrument, Span};

/// Final result of scraping one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Item processed; `images_complete` is false if some pages are missing
    Done {
        id: u64,
        dir: PathBuf,
        images_complete: bool,
    },

    /// Item directory already existed
    Skipped { id: u64, dir: PathBuf },

    /// Item aborted after reaching `state`
    Failed {
        id: u64,
        state: ItemState,
        reason: String,
    },
}

impl ItemOutcome {
    pub fn id(&self) -> u64 {
        match self {
            Self::Done { id, .. } | Self::Skipped { id, .. } | Self::Failed { id, .. } => *id,
        }
    }

    /// Item directory, for items that have one
    pub fn dir(&self) -> Option<&Path> {
        match self {
            Self::Done { dir, .. } | Self::Skipped { dir, .. } => Some(dir),
            Self::Failed { .. } => None,
        }
    }

    /// Terminal state of the item
    pub fn state(&self) -> ItemState {
        match self {
            Self::Done { .. } => ItemState::Done,
            Self::Skipped { .. } => ItemState::Skipped,
            Self::Failed { .. } => ItemState::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Runs the per-item state machine
#[derive(Clone)]
pub struct ItemScraper {
    fetcher: Arc<RetryingFetcher>,
    urls: Arc<CatalogUrls>,
    store: Arc<dyn ItemStore>,
    images: ImageSetDownloader,
    span: Span,
}

impl ItemScraper {
    pub fn new(
        fetcher: Arc<RetryingFetcher>,
        urls: Arc<CatalogUrls>,
        store: Arc<dyn ItemStore>,
        images: ImageSetDownloader,
        span: Span,
    ) -> Self {
        Self {
            fetcher,
            urls,
            store,
            images,
            span,
        }
    }

    /// Scrapes item `id`
    ///
    /// Never fails outright: problems are logged and reported as
    /// [`ItemOutcome::Failed`].
    pub async fn scrape(&self, id: u64) -> ItemOutcome {
        let span = tracing::info_span!(parent: &self.span, "item", id);
        self.scrape_inner(id).instrument(span).await
    }

    async fn scrape_inner(&self, id: u64) -> ItemOutcome {
        tracing::info!("Scraping item #{}", id);

        let mut progress = ItemProgress::new();

        if self.store.exists(id) {
            let dir = self.store.item_dir(id);
            tracing::warn!("Item directory {} already exists: skipping", dir.display());
            return ItemOutcome::Skipped { id, dir };
        }

        match self.run(id, &mut progress).await {
            Ok((dir, images_complete)) => {
                if images_complete {
                    tracing::info!("Item #{} saved to {}", id, dir.display());
                } else {
                    tracing::warn!(
                        "There has been at least one error trying to download #{}",
                        id
                    );
                }
                ItemOutcome::Done {
                    id,
                    dir,
                    images_complete,
                }
            }
            Err(e) => {
                let state = progress.state();
                tracing::warn!("Item #{} failed after state {}: {}", id, state, e);
                ItemOutcome::Failed {
                    id,
                    state,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn run(&self, id: u64, progress: &mut ItemProgress) -> Result<(PathBuf, bool)> {
        let item_url = self.urls.item_url(id);
        let body = self.fetch_document(&item_url).await?;
        progress.advance(ItemState::MetadataFetched)?;

        let metadata = parse_tags(&body, &item_url);
        let pages = metadata.pages().ok_or_else(|| HarvestError::MissingField {
            field: "page count",
            url: item_url.clone(),
        })?;
        progress.advance(ItemState::MetadataParsed)?;

        let dir = self.store.save_metadata(id, &metadata)?;
        progress.advance(ItemState::MetadataPersisted)?;

        let first_page_url = self.urls.first_page_url(id);
        let body = self.fetch_document(&first_page_url).await?;
        let link = parse_image_link(&body).ok_or_else(|| HarvestError::MissingField {
            field: "first image link",
            url: first_page_url.clone(),
        })?;
        let first_image = resolve_url(&first_page_url, &link)?;
        tracing::debug!("First image of #{}: {}", id, first_image);
        progress.advance(ItemState::FirstImageLocated)?;

        let images_complete = self.images.download_all(id, &first_image, pages).await;
        progress.advance(ItemState::ImagesDownloaded)?;
        progress.advance(ItemState::Done)?;

        Ok((dir, images_complete))
    }

    /// Fetches an HTML document, requiring a 2xx status
    async fn fetch_document(&self, url: &str) -> Result<Vec<u8>> {
        let outcome = self
            .fetcher
            .fetch(url)
            .await
            .ok_or_else(|| HarvestError::FetchFailed {
                url: url.to_string(),
            })?;

        if !outcome.is_success() {
            return Err(HarvestError::HttpStatus {
                url: url.to_string(),
                status: outcome.status,
            });
        }

        Ok(outcome.body)
    }
}

impl ScrapeItem for ItemScraper {
    async fn scrape(&self, id: u64) -> ItemOutcome {
        ItemScraper::scrape(self, id).await
    }
}
