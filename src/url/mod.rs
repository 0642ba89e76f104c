//! URL handling module for Kura-Harvest
//!
//! This module provides the catalog URL layout, next-page candidate
//! generation for image URLs, and file-name extraction for downloads.

mod catalog;
mod extension;

use crate::{UrlError, UrlResult};
use url::Url;

// Re-export main types
pub use catalog::CatalogUrls;
pub use extension::{next_page_candidates, CandidateUrls, ImageExtension, UnknownExtension};

/// Extracts the file name a downloaded URL is saved under
///
/// This is the final path segment, without query string or fragment, so
/// files keep the extension of the URL that actually succeeded.
///
/// # Examples
///
/// ```
/// use kura_harvest::url::file_name_from_url;
///
/// let name = file_name_from_url("https://i.example.net/galleries/7/12.webp?v=2").unwrap();
/// assert_eq!(name, "12.webp");
/// ```
pub fn file_name_from_url(url: &str) -> UrlResult<String> {
    let parsed = Url::parse(url).map_err(|e| UrlError::Parse(format!("{}: {}", url, e)))?;

    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| UrlError::MissingFileName(url.to_string()))
}

/// Resolves a link found on the page at `base` into an absolute URL
///
/// Absolute links are returned unchanged; relative and protocol-relative
/// ones take the missing parts from `base`.
pub fn resolve_url(base: &str, link: &str) -> UrlResult<String> {
    let base = Url::parse(base).map_err(|e| UrlError::Parse(format!("{}: {}", base, e)))?;
    let resolved = base
        .join(link.trim())
        .map_err(|e| UrlError::Parse(format!("{}: {}", link, e)))?;

    match resolved.scheme() {
        "http" | "https" => Ok(resolved.into()),
        other => Err(UrlError::InvalidScheme(other.to_string())),
    }
}
