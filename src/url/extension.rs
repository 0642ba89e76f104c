//! Image extensions and next-page candidate generation
//!
//! Catalog image URLs end in `{page}.{extension}`, but the extension is not
//! guaranteed to be the same for every page of an item. Given the URL of one
//! page, [`next_page_candidates`] yields the URLs the following page may live
//! at: the same extension first, then every other known extension once.

use std::fmt;
use std::iter::FusedIterator;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// Known image file extensions
///
/// The declaration order is the probing order used when the inherited
/// extension fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageExtension {
    Jpg,
    Png,
    Webp,
    Jpeg,
    Gif,
    Svg,
    Ico,
    Bmp,
    Tiff,
    Tif,
    Avif,
    Heic,
    Heif,
    Raw,
}

/// Returned when a string names no known extension
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown image extension: {0}")]
pub struct UnknownExtension(pub String);

impl ImageExtension {
    /// Every extension, in probing order
    pub const ALL: [ImageExtension; 14] = [
        Self::Jpg,
        Self::Png,
        Self::Webp,
        Self::Jpeg,
        Self::Gif,
        Self::Svg,
        Self::Ico,
        Self::Bmp,
        Self::Tiff,
        Self::Tif,
        Self::Avif,
        Self::Heic,
        Self::Heif,
        Self::Raw,
    ];

    /// Extension assumed when a URL carries an unrecognized one
    pub const DEFAULT: ImageExtension = Self::Jpg;

    /// Lowercase textual form, without the leading dot
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Svg => "svg",
            Self::Ico => "ico",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Tif => "tif",
            Self::Avif => "avif",
            Self::Heic => "heic",
            Self::Heif => "heif",
            Self::Raw => "raw",
        }
    }

    /// Yields `self`, then every other extension in probing order
    pub fn starting_from(self) -> impl Iterator<Item = ImageExtension> {
        std::iter::once(self).chain(Self::ALL.into_iter().filter(move |ext| *ext != self))
    }
}

impl fmt::Display for ImageExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageExtension {
    type Err = UnknownExtension;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ext| ext.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownExtension(s.to_string()))
    }
}

/// The parts of a page URL that candidates are built from
#[derive(Debug, Clone)]
struct PageTemplate {
    url: Url,
    directory: String,
    page: u64,
}

/// Lazy, finite sequence of URLs for the page after a given one
///
/// Produced by [`next_page_candidates`]; call it again to restart from any URL.
#[derive(Debug, Clone)]
pub struct CandidateUrls {
    template: Option<PageTemplate>,
    first: ImageExtension,
    position: usize,
}

impl CandidateUrls {
    fn empty() -> Self {
        Self {
            template: None,
            first: ImageExtension::DEFAULT,
            position: 0,
        }
    }

    /// Page number the candidates point at, if the input URL was usable
    pub fn page(&self) -> Option<u64> {
        self.template.as_ref().map(|template| template.page)
    }

    /// Extension tried first
    pub fn first_extension(&self) -> ImageExtension {
        self.first
    }

    fn extension_at(&self, position: usize) -> Option<ImageExtension> {
        self.first.starting_from().nth(position)
    }

    fn remaining(&self) -> usize {
        match self.template {
            Some(_) => ImageExtension::ALL.len().saturating_sub(self.position),
            None => 0,
        }
    }
}

impl Iterator for CandidateUrls {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let template = self.template.as_ref()?;
        let ext = self.extension_at(self.position)?;
        self.position += 1;

        let mut url = template.url.clone();
        url.set_path(&format!("{}/{}.{}", template.directory, template.page, ext));
        Some(url.into())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CandidateUrls {}

impl FusedIterator for CandidateUrls {}

/// Builds the candidate URLs for the page following `previous_url`
///
/// The trailing path segment of `previous_url` must look like
/// `{number}.{extension}`. The candidates point at `number + 1`; the first
/// reuses the input's extension (or [`ImageExtension::DEFAULT`] if it is not
/// a known one), the rest cover every other known extension exactly once.
/// Query strings are carried over unchanged.
///
/// Returns an empty sequence when the URL does not parse, has no extension,
/// or its page segment is not a base-10 integer.
///
/// # Example
///
/// ```
/// use kura_harvest::url::next_page_candidates;
///
/// let mut candidates = next_page_candidates("https://i.example.net/galleries/7/5.png");
/// assert_eq!(candidates.next().as_deref(), Some("https://i.example.net/galleries/7/6.png"));
/// assert_eq!(candidates.next().as_deref(), Some("https://i.example.net/galleries/7/6.jpg"));
/// ```
pub fn next_page_candidates(previous_url: &str) -> CandidateUrls {
    let url = match Url::parse(previous_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Cannot build next page URL from {}: {}", previous_url, e);
            return CandidateUrls::empty();
        }
    };

    let Some((directory, file_name)) = url.path().rsplit_once('/') else {
        return CandidateUrls::empty();
    };

    let Some((name, ext)) = file_name.rsplit_once('.') else {
        tracing::warn!("No extension found in URL: {}", previous_url);
        return CandidateUrls::empty();
    };

    let page = match name.parse::<u64>() {
        Ok(page) => page,
        Err(_) => {
            tracing::warn!("Failed to parse page number from: {}", name);
            return CandidateUrls::empty();
        }
    };

    let Some(next_page) = page.checked_add(1) else {
        return CandidateUrls::empty();
    };

    let first = ext.parse::<ImageExtension>().unwrap_or_else(|e| {
        tracing::debug!("{}; assuming {}", e, ImageExtension::DEFAULT);
        ImageExtension::DEFAULT
    });

    CandidateUrls {
        template: Some(PageTemplate {
            directory: directory.to_string(),
            page: next_page,
            url,
        }),
        first,
        position: 0,
    }
}
