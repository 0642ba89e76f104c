//! Harvester facade
//!
//! [`Harvester`] wires the shared pieces of one run together: a single HTTP
//! client, rate limiter and concurrency gate behind one fetcher, the item
//! store, the per-item scraper, the extent finder and the batch
//! orchestrator. Every component gets its own child span of the
//! harvester's root span.

use crate::config::Config;
use crate::harvester::batch::{known_total, BatchOrchestrator, BatchProgress};
use crate::harvester::extent::CatalogExtentFinder;
use crate::harvester::fetcher::{build_http_client, RetryingFetcher};
use crate::harvester::gate::ConcurrencyGate;
use crate::harvester::images::ImageSetDownloader;
use crate::harvester::item::{ItemOutcome, ItemScraper};
use crate::harvester::rate_limiter::RateLimiter;
use crate::harvester::user_agents::UserAgentPool;
use crate::output::{audit_library, AuditReport, ResultSink};
use crate::storage::{FsItemStore, StorageResult};
use crate::url::CatalogUrls;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::Span;

/// Entry point of the harvesting engine
pub struct Harvester {
    store: Arc<FsItemStore>,
    scraper: ItemScraper,
    extent: CatalogExtentFinder,
    orchestrator: BatchOrchestrator,
    max_concurrent_requests: usize,
    max_requests_per_second: Option<f64>,
    span: Span,
}

impl Harvester {
    /// Builds a harvester from a loaded configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Harvester)` - Ready to scrape
    /// * `Err(HarvestError)` - Save directory, catalog URLs or HTTP client
    ///   could not be set up
    pub fn new(config: &Config) -> Result<Self> {
        let span = tracing::info_span!("harvester");
        let settings = &config.harvester;

        let store = Arc::new(FsItemStore::open(
            &settings.save_dir,
            &config.catalog.meta_file_name,
        )?);
        let urls = Arc::new(CatalogUrls::from_config(&config.catalog)?);
        let client = build_http_client(Duration::from_secs(settings.timeout_secs))?;

        let (rate_limiter, user_agents) = span.in_scope(|| {
            (
                Arc::new(RateLimiter::new(settings.effective_rate())),
                Arc::new(UserAgentPool::from_config(&config.user_agent)),
            )
        });
        let gate = ConcurrencyGate::new(settings.max_concurrent_requests as usize);

        let fetcher = Arc::new(RetryingFetcher::new(
            client,
            rate_limiter,
            gate,
            user_agents,
            settings.retries,
            tracing::info_span!(parent: &span, "fetcher"),
        ));

        let images = ImageSetDownloader::new(
            Arc::clone(&fetcher),
            store.clone(),
            tracing::info_span!(parent: &span, "images"),
        );
        let scraper = ItemScraper::new(
            Arc::clone(&fetcher),
            Arc::clone(&urls),
            store.clone(),
            images,
            tracing::info_span!(parent: &span, "scraper"),
        );
        let extent = CatalogExtentFinder::new(
            Arc::clone(&fetcher),
            urls,
            config.catalog.probe_upper_bound,
            tracing::info_span!(parent: &span, "extent"),
        );
        let orchestrator =
            BatchOrchestrator::from_config(settings, tracing::info_span!(parent: &span, "batch"));

        Ok(Self {
            store,
            scraper,
            extent,
            orchestrator,
            max_concurrent_requests: settings.max_concurrent_requests.max(1) as usize,
            max_requests_per_second: settings.effective_rate(),
            span,
        })
    }

    /// Item store the harvester writes to
    pub fn store(&self) -> &FsItemStore {
        &self.store
    }

    /// Scrapes one item
    ///
    /// An existing item directory is returned as [`ItemOutcome::Skipped`]
    /// without any request being made.
    pub async fn scrape_single(&self, id: u64) -> ItemOutcome {
        self.scraper.scrape(id).await
    }

    /// Scrapes every identifier of `ids` in batches
    pub async fn scrape_many<I>(&self, ids: I, sink: &dyn ResultSink) -> BatchProgress
    where
        I: IntoIterator<Item = u64>,
    {
        let ids = ids.into_iter();
        let total = known_total(&ids).map_or_else(|| "[size unknown]".to_string(), |n| n.to_string());

        self.span.in_scope(|| {
            tracing::info!(
                "Scraping {} items. Batch size of {}, number of concurrent downloads allowed: {}, number of requests per second allowed: {} req/s",
                total,
                self.orchestrator.batch_size(),
                self.max_concurrent_requests,
                self.rate_description()
            )
        });

        self.orchestrator.scrape_many(&self.scraper, ids, sink).await
    }

    /// Highest item identifier of the catalog, if it can be determined
    pub async fn find_highest_id(&self) -> Option<u64> {
        self.extent.find_highest_id().await
    }

    /// Scrapes every identifier from 1 to the catalog's highest one
    ///
    /// Returns `None` without scraping if the extent is unknown.
    pub async fn scrape_all(&self, sink: &dyn ResultSink) -> Option<BatchProgress> {
        let Some(max_id) = self.find_highest_id().await.filter(|id| *id >= 1) else {
            self.span
                .in_scope(|| tracing::error!("Failed to determine the highest ID"));
            return None;
        };

        Some(self.scrape_many(1..=max_id, sink).await)
    }

    /// Scrapes `n` distinct identifiers picked uniformly from `[min_id, max_id]`
    ///
    /// # Arguments
    ///
    /// * `n` - How many items to scrape; `None` scrapes the whole range in
    ///   random order
    /// * `min_id` - Lowest identifier to pick (at least 1)
    /// * `max_id` - Highest identifier to pick; defaults to the catalog extent
    /// * `sink` - Receives every finished item
    ///
    /// # Returns
    ///
    /// `None` without scraping if the extent is unknown, the range is empty
    /// or `n` exceeds the range.
    pub async fn scrape_random(
        &self,
        n: Option<u64>,
        min_id: u64,
        max_id: Option<u64>,
        sink: &dyn ResultSink,
    ) -> Option<BatchProgress> {
        let Some(highest) = self.find_highest_id().await.filter(|id| *id >= 1) else {
            self.span
                .in_scope(|| tracing::error!("Failed to determine the highest ID"));
            return None;
        };

        let min_id = min_id.max(1);
        let max_id = max_id.unwrap_or(highest);

        let ids = self.span.in_scope(|| pick_random_ids(n, min_id, max_id))?;

        self.span.in_scope(|| {
            tracing::info!(
                "Scraping {} items randomly from ID {} to {}",
                ids.len(),
                min_id,
                max_id
            )
        });

        Some(self.scrape_many(ids, sink).await)
    }

    /// Audits the save directory without modifying it
    pub fn audit(&self) -> StorageResult<AuditReport> {
        let _entered = self.span.enter();
        audit_library(self.store.root(), self.store.meta_file_name())
    }

    fn rate_description(&self) -> String {
        match self.max_requests_per_second {
            Some(rate) => rate.to_string(),
            None => "unlimited".to_string(),
        }
    }
}

/// Samples distinct identifiers from `[min_id, max_id]` without replacement
fn pick_random_ids(n: Option<u64>, min_id: u64, max_id: u64) -> Option<Vec<u64>> {
    if max_id < min_id {
        tracing::error!("Cannot choose random IDs: max ID must not be lower than min ID");
        return None;
    }

    let population = max_id - min_id + 1;
    let amount = n.unwrap_or(population);

    if amount > population {
        tracing::warn!(
            "Cannot choose {} random IDs out of a population of {}",
            amount,
            population
        );
        return None;
    }

    let (Ok(length), Ok(amount)) = (usize::try_from(population), usize::try_from(amount)) else {
        tracing::error!("ID range too large to sample from");
        return None;
    };

    let mut rng = rand::rng();
    let ids = rand::seq::index::sample(&mut rng, length, amount)
        .into_iter()
        .map(|index| min_id + index as u64)
        .collect();
    Some(ids)
}
