//! Result sink interface
//!
//! A result sink receives the outcome of every finished item, in the order
//! items finish. Implementations must be thread-safe.

use crate::harvester::ItemOutcome;

/// Receives one completed item's outcome
pub trait ResultSink: Send + Sync {
    /// Handles the outcome of one finished item
    ///
    /// Called exactly once per item, in completion order.
    fn on_item(&self, outcome: &ItemOutcome);
}

/// Sink that ignores every outcome
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ResultSink for NoopSink {
    fn on_item(&self, _outcome: &ItemOutcome) {}
}

/// Adapts a closure into a [`ResultSink`]
///
/// # Example
///
/// ```
/// use kura_harvest::output::{FnSink, ResultSink};
/// use kura_harvest::ItemOutcome;
/// use std::path::PathBuf;
///
/// let sink = FnSink::new(|outcome: &ItemOutcome| {
///     if let Some(dir) = outcome.dir() {
///         println!("Downloaded to: {}", dir.display());
///     }
/// });
/// sink.on_item(&ItemOutcome::Skipped { id: 1, dir: PathBuf::from("1") });
/// ```
#[derive(Debug, Clone)]
pub struct FnSink<F> {
    callback: F,
}

impl<F> FnSink<F>
where
    F: Fn(&ItemOutcome) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ResultSink for FnSink<F>
where
    F: Fn(&ItemOutcome) + Send + Sync,
{
    fn on_item(&self, outcome: &ItemOutcome) {
        (self.callback)(outcome)
    }
}
