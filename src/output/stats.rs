//! Run statistics
//!
//! [`RunStats`] is a result sink that counts outcomes as items finish, so a
//! summary can be printed once the run is over.

use crate::harvester::ItemOutcome;
use crate::output::ResultSink;
use crate::state::ItemState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Counts item outcomes of one run
#[derive(Debug, Default)]
pub struct RunStats {
    done: AtomicU64,
    incomplete: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    failed_at: Mutex<HashMap<ItemState, u64>>,
}

/// Snapshot of [`RunStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items fully downloaded
    pub done: u64,

    /// Items saved with at least one missing page
    pub incomplete: u64,

    /// Items whose directory already existed
    pub skipped: u64,

    /// Items aborted
    pub failed: u64,

    /// Failed items by the state they had reached, most frequent first
    pub failed_at: Vec<(ItemState, u64)>,
}

impl RunSummary {
    /// Number of items seen
    pub fn total(&self) -> u64 {
        self.done + self.incomplete + self.skipped + self.failed
    }

    /// Share of processed (non-skipped) items saved completely, in percent
    pub fn success_rate(&self) -> f64 {
        let processed = self.done + self.incomplete + self.failed;
        if processed == 0 {
            return 0.0;
        }
        (self.done as f64 / processed as f64) * 100.0
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of the counters
    pub fn summary(&self) -> RunSummary {
        let mut failed_at: Vec<_> = match self.failed_at.lock() {
            Ok(map) => map.iter().map(|(state, count)| (*state, *count)).collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .map(|(state, count)| (*state, *count))
                .collect(),
        };
        failed_at.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));

        RunSummary {
            done: self.done.load(Ordering::Relaxed),
            incomplete: self.incomplete.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            failed_at,
        }
    }
}

impl ResultSink for RunStats {
    fn on_item(&self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Done {
                images_complete: true,
                ..
            } => {
                self.done.fetch_add(1, Ordering::Relaxed);
            }
            ItemOutcome::Done { .. } => {
                self.incomplete.fetch_add(1, Ordering::Relaxed);
            }
            ItemOutcome::Skipped { .. } => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            ItemOutcome::Failed { state, .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                let mut failed_at = match self.failed_at.lock() {
                    Ok(map) => map,
                    Err(poisoned) => poisoned.into_inner(),
                };
                *failed_at.entry(*state).or_insert(0) += 1;
            }
        }
    }
}

/// Prints a summary to stdout in a formatted manner
pub fn print_summary(summary: &RunSummary) {
    println!("=== Harvest Statistics ===\n");

    println!("Items:");
    println!("  Total seen: {}", summary.total());
    println!("  Done: {}", summary.done);
    println!("  Done with missing pages: {}", summary.incomplete);
    println!("  Skipped (already present): {}", summary.skipped);
    println!("  Failed: {}", summary.failed);
    println!();

    if !summary.failed_at.is_empty() {
        println!("Failures by last reached state:");
        for (state, count) in &summary.failed_at {
            println!("  {}: {}", state, count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} items fully downloaded)",
        summary.success_rate(),
        summary.done,
        summary.done + summary.incomplete + summary.failed
    );
}
