//! Read-only library audit
//!
//! Scans a save directory and reports items that a previous run left
//! incomplete. Nothing is deleted; the report lists what a cleanup would
//! have to look at.
//!
//! Only directories named by a number are treated as items. For each item
//! the audit checks that:
//! - the metadata document exists
//! - its page count parses as a positive integer
//! - the number of image files matches the page count
//! - the directory holds nothing but files

use crate::storage::{StorageError, StorageResult, PAGES_KEY};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Problem found in one item directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditIssue {
    /// No metadata document
    MissingMetadata { dir: PathBuf },

    /// Metadata document unreadable, or page count absent or invalid
    BadPageCount { dir: PathBuf },

    /// Image files do not match the page count
    PageMismatch {
        dir: PathBuf,
        expected: u64,
        found: u64,
    },

    /// Entry inside an item directory that is not a regular file
    StrayEntry { path: PathBuf },
}

impl fmt::Display for AuditIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMetadata { dir } => {
                write!(f, "{}: metadata document does not exist", dir.display())
            }
            Self::BadPageCount { dir } => {
                write!(f, "{}: failed to parse the page count", dir.display())
            }
            Self::PageMismatch {
                dir,
                expected,
                found,
            } => write!(
                f,
                "{}: page mismatch, expected {}, got {}",
                dir.display(),
                expected,
                found
            ),
            Self::StrayEntry { path } => write!(f, "{}: not an image file", path.display()),
        }
    }
}

/// Result of auditing a save directory
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    /// Number of item directories inspected
    pub items_scanned: u64,

    /// Entries ignored because they are not item directories
    pub ignored: Vec<PathBuf>,

    pub issues: Vec<AuditIssue>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Audits every item directory under `root`
///
/// # Arguments
///
/// * `root` - Save directory holding one directory per item
/// * `meta_file_name` - Name of the metadata document inside each item
///
/// # Returns
///
/// * `Ok(AuditReport)` - Issues found, sorted by path
/// * `Err(StorageError)` - `root` or one of its items could not be listed
pub fn audit_library(root: &Path, meta_file_name: &str) -> StorageResult<AuditReport> {
    let mut report = AuditReport::default();

    let mut entries: Vec<PathBuf> = fs::read_dir(root)
        .map_err(|e| StorageError::io(root, e))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .collect();
    entries.sort();

    for path in entries {
        let is_item = path.is_dir()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.parse::<u64>().is_ok());

        if !is_item {
            tracing::debug!("Ignoring non-item entry {}", path.display());
            report.ignored.push(path);
            continue;
        }

        report.items_scanned += 1;
        report.issues.extend(audit_item(&path, meta_file_name)?);
    }

    tracing::info!(
        "Audited {} items: {} issues",
        report.items_scanned,
        report.issues.len()
    );
    Ok(report)
}

fn audit_item(dir: &Path, meta_file_name: &str) -> StorageResult<Vec<AuditIssue>> {
    let meta_path = dir.join(meta_file_name);
    if !meta_path.is_file() {
        return Ok(vec![AuditIssue::MissingMetadata {
            dir: dir.to_path_buf(),
        }]);
    }

    let Some(expected) = read_page_count(&meta_path) else {
        return Ok(vec![AuditIssue::BadPageCount {
            dir: dir.to_path_buf(),
        }]);
    };

    let mut stray = Vec::new();
    let mut found = 0u64;

    for entry in fs::read_dir(dir).map_err(|e| StorageError::io(dir, e))? {
        let entry = entry.map_err(|e| StorageError::io(dir, e))?;
        let path = entry.path();

        if entry.file_name() == meta_file_name {
            continue;
        }

        // symlinks are not followed
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_file {
            found += 1;
        } else {
            stray.push(AuditIssue::StrayEntry { path });
        }
    }

    if found != expected {
        return Ok(vec![AuditIssue::PageMismatch {
            dir: dir.to_path_buf(),
            expected,
            found,
        }]);
    }

    stray.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
    Ok(stray)
}

/// Page count of a metadata document: a positive integer or numeric string
fn read_page_count(meta_path: &Path) -> Option<u64> {
    let bytes = fs::read(meta_path).ok()?;
    let document: Value = match serde_json::from_slice(&bytes) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!("Failed to load metadata {}: {}", meta_path.display(), e);
            return None;
        }
    };

    match document.get(PAGES_KEY)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .filter(|pages| *pages > 0)
}

/// Prints an audit report to stdout in a formatted manner
pub fn print_audit_report(report: &AuditReport) {
    println!("=== Library Audit ===\n");
    println!("  Items scanned: {}", report.items_scanned);
    println!("  Ignored entries: {}", report.ignored.len());
    println!("  Issues: {}", report.issues.len());
    println!();

    for issue in &report.issues {
        println!("  - {}", issue);
    }
}
