//! Batch orchestration
//!
//! Drives many item scrapes in fixed-size batches. Items of one batch run
//! concurrently and are reported in completion order; a randomized pause
//! separates consecutive batches. One item failing, or panicking, never
//! affects the others.

use crate::config::HarvesterConfig;
use crate::harvester::item::ItemOutcome;
use crate::output::ResultSink;
use crate::state::ItemState;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use rand::Rng;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{Instrument, Span};

/// Something that can scrape one item by identifier
pub trait ScrapeItem: Sync {
    fn scrape(&self, id: u64) -> impl Future<Output = ItemOutcome> + Send;
}

/// Progress of one orchestrated run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchProgress {
    /// Items finished so far, whatever their outcome
    pub completed: u64,

    /// Number of items, when the identifier source knows it
    pub total: Option<u64>,

    /// Batches finished so far
    pub batch: u64,
}

impl BatchProgress {
    /// Completion percentage, when the total is known
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(100.0),
            Some(total) => Some(self.completed as f64 / total as f64 * 100.0),
            None => None,
        }
    }
}

/// Number of identifiers an iterator will yield, if it says so exactly
pub fn known_total<I: Iterator>(ids: &I) -> Option<u64> {
    match ids.size_hint() {
        (lower, Some(upper)) if lower == upper => u64::try_from(lower).ok(),
        _ => None,
    }
}

/// Runs item scrapes batch by batch
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    batch_size: usize,
    pause_min: Duration,
    pause_max: Duration,
    span: Span,
}

impl BatchOrchestrator {
    /// Creates an orchestrator
    ///
    /// # Arguments
    ///
    /// * `batch_size` - Items per batch (at least one)
    /// * `pause_min` / `pause_max` - Bounds of the random pause between batches
    /// * `span` - Span all batch logs are recorded under
    pub fn new(batch_size: usize, pause_min: Duration, pause_max: Duration, span: Span) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pause_min,
            pause_max: pause_max.max(pause_min),
            span,
        }
    }

    /// Creates an orchestrator from the `[harvester]` configuration section
    pub fn from_config(config: &HarvesterConfig, span: Span) -> Self {
        Self::new(
            config.effective_batch_size(),
            Duration::from_millis(config.batch_pause_min_ms),
            Duration::from_millis(config.batch_pause_max_ms),
            span,
        )
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Scrapes every identifier of `ids`
    ///
    /// The identifier source may be unbounded; it is consumed one batch at a
    /// time. `sink` sees every item exactly once, in completion order.
    ///
    /// # Returns
    ///
    /// The final progress counters.
    pub async fn scrape_many<S, I>(&self, scraper: &S, ids: I, sink: &dyn ResultSink) -> BatchProgress
    where
        S: ScrapeItem,
        I: IntoIterator<Item = u64>,
    {
        let ids = ids.into_iter();
        let total = known_total(&ids);

        self.run(scraper, ids, total, sink)
            .instrument(self.span.clone())
            .await
    }

    async fn run<S, I>(
        &self,
        scraper: &S,
        mut ids: I,
        total: Option<u64>,
        sink: &dyn ResultSink,
    ) -> BatchProgress
    where
        S: ScrapeItem,
        I: Iterator<Item = u64>,
    {
        let mut progress = BatchProgress {
            completed: 0,
            total,
            batch: 0,
        };

        loop {
            let batch: Vec<u64> = ids.by_ref().take(self.batch_size).collect();
            if batch.is_empty() {
                break;
            }

            if progress.batch > 0 {
                let pause = self.pause_duration();
                tracing::debug!("Pausing {:?} before batch #{}", pause, progress.batch + 1);
                tokio::time::sleep(pause).await;
            }

            let mut running: FuturesUnordered<_> = batch
                .into_iter()
                .map(|id| {
                    AssertUnwindSafe(scraper.scrape(id))
                        .catch_unwind()
                        .map(move |result| {
                            result.unwrap_or_else(|panic| {
                                let reason = panic_message(&*panic);
                                tracing::error!("Task for item #{} failed: {}", id, reason);
                                ItemOutcome::Failed {
                                    id,
                                    state: ItemState::Start,
                                    reason,
                                }
                            })
                        })
                })
                .collect();

            while let Some(outcome) = running.next().await {
                progress.completed += 1;
                match (progress.total, progress.percent()) {
                    (Some(total), Some(percent)) => tracing::info!(
                        "Progress: {}/{} ({:.1}%)",
                        progress.completed,
                        total,
                        percent
                    ),
                    _ => tracing::info!("Progress: {} items", progress.completed),
                }
                sink.on_item(&outcome);
            }

            progress.batch += 1;
            tracing::debug!("Processed batch #{}", progress.batch);
        }

        progress
    }

    fn pause_duration(&self) -> Duration {
        if self.pause_max <= self.pause_min {
            return self.pause_min;
        }
        rand::rng().random_range(self.pause_min..=self.pause_max)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panicked".to_string())
}
