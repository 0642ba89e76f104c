//! Two-phase image-set downloader
//!
//! # Strategy
//!
//! **Phase A (gamble):** page 1 is downloaded from its known URL. Pages
//! `2..=N` are then assumed to share page 1's extension and are all
//! downloaded concurrently. Once [`GAMBLE_FAILURE_LIMIT`] downloads have
//! failed, every pending download is aborted; all spawned tasks are still
//! awaited before the phase returns.
//!
//! **Phase B (safe):** entered only when Phase A saw at least one failure.
//! Pages are downloaded one after the other, page 1 first. Each following
//! page tries every candidate extension in order, and the URL that
//! succeeded seeds the candidates of the next page.
//!
//! Files already written are never removed, whatever the outcome.

use crate::harvester::fetcher::RetryingFetcher;
use crate::storage::ItemStore;
use crate::url::{file_name_from_url, next_page_candidates};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{Instrument, Span};

/// Failures after which the Phase A gamble is abandoned
pub const GAMBLE_FAILURE_LIMIT: usize = 3;

/// Page downloads counted during Phase A
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadTally {
    pub failures: usize,
    pub successes: usize,
}

/// How Phase A ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GambleOutcome {
    /// Page 1 could not be downloaded; nothing else was attempted
    FirstPageFailed,
    /// Page 1 succeeded and the gamble ran (possibly aborted early)
    Finished(DownloadTally),
}

/// Downloads every page of one item into its store directory
#[derive(Clone)]
pub struct ImageSetDownloader {
    fetcher: Arc<RetryingFetcher>,
    store: Arc<dyn ItemStore>,
    span: Span,
}

impl ImageSetDownloader {
    pub fn new(fetcher: Arc<RetryingFetcher>, store: Arc<dyn ItemStore>, span: Span) -> Self {
        Self {
            fetcher,
            store,
            span,
        }
    }

    /// Downloads pages `1..=pages` of item `id`
    ///
    /// # Arguments
    ///
    /// * `id` - Item identifier
    /// * `first_url` - Direct URL of page 1
    /// * `pages` - Page count from the item's metadata
    ///
    /// # Returns
    ///
    /// `true` if every page ended up on disk without errors. The value is
    /// diagnostic only; partial downloads stay in place either way.
    pub async fn download_all(&self, id: u64, first_url: &str, pages: u32) -> bool {
        self.download_all_inner(id, first_url, pages)
            .instrument(self.span.clone())
            .await
    }

    async fn download_all_inner(&self, id: u64, first_url: &str, pages: u32) -> bool {
        let tally = match self.gamble(id, first_url, pages).await {
            GambleOutcome::FirstPageFailed => {
                tracing::warn!("Item #{}: first page failed, aborting image download", id);
                return false;
            }
            GambleOutcome::Finished(tally) => tally,
        };

        if tally.failures == 0 {
            tracing::debug!(
                "Item #{}: all {} pages downloaded by the gamble",
                id,
                tally.successes
            );
            return true;
        }

        tracing::warn!(
            "Item #{}: gamble failed ({} losses out of {} gambled pages). Retrying safely.",
            id,
            tally.failures,
            pages.saturating_sub(1)
        );

        self.download_sequential(id, first_url, pages).await
    }

    /// Phase A: concurrent downloads under page 1's extension
    async fn gamble(&self, id: u64, first_url: &str, pages: u32) -> GambleOutcome {
        if !self.download_page(id, first_url).await {
            return GambleOutcome::FirstPageFailed;
        }

        let mut tally = DownloadTally {
            failures: 0,
            successes: 1,
        };

        let mut tasks = JoinSet::new();
        let mut previous = first_url.to_string();

        for _ in 2..=pages {
            let Some(url) = next_page_candidates(&previous).next() else {
                tracing::warn!(
                    "Item #{}: no candidate URL after {}, aborting gamble",
                    id,
                    previous
                );
                tally.failures += 1;
                break;
            };
            previous.clone_from(&url);

            let downloader = self.clone();
            tasks.spawn(
                async move { downloader.download_page(id, &url).await }
                    .instrument(Span::current()),
            );
        }

        let mut aborted = false;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => {
                    tally.successes += 1;
                    tracing::debug!("Item #{}: page {}/{} downloaded", id, tally.successes, pages);
                }
                Ok(false) => tally.failures += 1,
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    tracing::error!("Item #{}: page download task failed: {}", id, e);
                    tally.failures += 1;
                }
            }

            if !aborted && tally.failures >= GAMBLE_FAILURE_LIMIT {
                tracing::warn!(
                    "Item #{}: {} gambles failed, cancelling remaining downloads",
                    id,
                    tally.failures
                );
                tasks.abort_all();
                aborted = true;
            }
        }

        GambleOutcome::Finished(tally)
    }

    /// Phase B: page-by-page downloads trying every extension
    async fn download_sequential(&self, id: u64, first_url: &str, pages: u32) -> bool {
        if !self.download_page(id, first_url).await {
            tracing::warn!("Item #{}: first page failed during safe download", id);
            return false;
        }

        let mut complete = true;
        let mut previous = first_url.to_string();

        for page in 2..=pages {
            let mut candidates = next_page_candidates(&previous);
            let Some(inherited) = candidates.next() else {
                tracing::error!(
                    "Item #{}: cannot derive URL of page {} from {}",
                    id,
                    page,
                    previous
                );
                return false;
            };

            let mut found = None;
            for candidate in std::iter::once(inherited.clone()).chain(candidates) {
                if self.download_page(id, &candidate).await {
                    found = Some(candidate);
                    break;
                }
                tracing::debug!("Item #{}: page {} candidate {} failed", id, page, candidate);
            }

            match found {
                Some(url) => {
                    tracing::debug!("Item #{}: page {}/{} downloaded", id, page, pages);
                    previous = url;
                }
                None => {
                    tracing::warn!("Item #{}: page {}/{}: every extension failed", id, page, pages);
                    complete = false;
                    previous = inherited;
                }
            }
        }

        complete
    }

    /// Downloads one page and writes it under its URL's file name
    pub async fn download_page(&self, id: u64, url: &str) -> bool {
        let file_name = match file_name_from_url(url) {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!("No file name for image at {}: {}", url, e);
                return false;
            }
        };

        let Some(outcome) = self.fetcher.fetch(url).await else {
            tracing::debug!("Fetch failed for {}", url);
            return false;
        };

        if !outcome.is_success() {
            tracing::debug!("HTTP {} for {}", outcome.status, url);
            return false;
        }

        match self.store.save_page(id, &file_name, &outcome.body) {
            Ok(path) => {
                tracing::debug!("Downloaded {} -> {}", url, path.display());
                true
            }
            Err(e) => {
                tracing::error!("Failed to save {}: {}", url, e);
                false
            }
        }
    }
}
