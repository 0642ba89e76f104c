//! Output module for reporting harvest results
//!
//! This module handles:
//! - The result-sink interface fed by the batch orchestrator
//! - Counting outcomes into run statistics
//! - Auditing a save directory for incomplete items

pub mod audit;
pub mod stats;
mod traits;

pub use audit::{audit_library, print_audit_report, AuditIssue, AuditReport};
pub use stats::{print_summary, RunStats, RunSummary};
pub use traits::{FnSink, NoopSink, ResultSink};
