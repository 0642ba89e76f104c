use crate::config::CatalogConfig;
use crate::{UrlError, UrlResult};
use url::Url;

/// URL layout of the remote catalog
///
/// Item `id` has its metadata page at `{gallery}{id}/` and its first image
/// page at `{gallery}{id}/1/`.
#[derive(Debug, Clone)]
pub struct CatalogUrls {
    gallery: Url,
    latest_search: Option<Url>,
}

impl CatalogUrls {
    /// Builds the layout from a gallery base URL and an optional search URL
    ///
    /// The gallery URL must be an absolute http(s) URL without query or
    /// fragment; a trailing slash is added when missing.
    pub fn new(gallery_url: &str, latest_search_url: Option<&str>) -> UrlResult<Self> {
        let mut gallery = parse_http_url(gallery_url)?;

        if gallery.query().is_some() || gallery.fragment().is_some() {
            return Err(UrlError::Parse(format!(
                "gallery URL must not carry a query or fragment: {}",
                gallery_url
            )));
        }

        if !gallery.path().ends_with('/') {
            let path = format!("{}/", gallery.path());
            gallery.set_path(&path);
        }

        let latest_search = latest_search_url.map(parse_http_url).transpose()?;

        Ok(Self {
            gallery,
            latest_search,
        })
    }

    /// Builds the layout from the `[catalog]` configuration section
    pub fn from_config(config: &CatalogConfig) -> UrlResult<Self> {
        Self::new(&config.gallery_url, config.latest_search_url.as_deref())
    }

    /// Metadata page of an item
    pub fn item_url(&self, id: u64) -> String {
        format!("{}{}/", self.gallery, id)
    }

    /// First image page of an item
    pub fn first_page_url(&self, id: u64) -> String {
        format!("{}{}/1/", self.gallery, id)
    }

    /// Search page listing the newest item first, if configured
    pub fn latest_search_url(&self) -> Option<&str> {
        self.latest_search.as_ref().map(Url::as_str)
    }
}

fn parse_http_url(value: &str) -> UrlResult<Url> {
    let url = Url::parse(value).map_err(|e| UrlError::Parse(format!("{}: {}", value, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(UrlError::InvalidScheme(other.to_string())),
    }
}
