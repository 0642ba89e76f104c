//! Catalog extent discovery
//!
//! Finds the highest valid item identifier. The latest-uploads search page
//! is asked first; when that fails the identifier space is binary searched
//! by probing item pages.
//!
//! The binary search is an approximation: an identifier can fail to resolve
//! for reasons other than not existing yet (removed items, blocked probes),
//! which biases the result downward.

use crate::harvester::fetcher::RetryingFetcher;
use crate::harvester::parser::parse_highest_id;
use crate::url::CatalogUrls;
use std::sync::Arc;
use tracing::{Instrument, Span};

/// Determines the highest item identifier of the catalog
#[derive(Debug, Clone)]
pub struct CatalogExtentFinder {
    fetcher: Arc<RetryingFetcher>,
    urls: Arc<CatalogUrls>,
    probe_upper_bound: u64,
    span: Span,
}

impl CatalogExtentFinder {
    /// Creates a finder
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Fetcher used for the search page and the probes
    /// * `urls` - Catalog URL layout
    /// * `probe_upper_bound` - Upper end of the binary-search range `[1, bound]`
    /// * `span` - Span all extent logs are recorded under
    pub fn new(
        fetcher: Arc<RetryingFetcher>,
        urls: Arc<CatalogUrls>,
        probe_upper_bound: u64,
        span: Span,
    ) -> Self {
        Self {
            fetcher,
            urls,
            probe_upper_bound,
            span,
        }
    }

    /// Finds the highest item identifier
    ///
    /// # Returns
    ///
    /// * `Some(id)` - From the search page, or the best binary-search estimate
    /// * `None` - Both methods failed
    pub async fn find_highest_id(&self) -> Option<u64> {
        async {
            if let Some(id) = self.from_latest_search().await {
                tracing::info!("Highest ID found: #{}", id);
                return Some(id);
            }

            tracing::info!(
                "Falling back to binary search over IDs 1..={}",
                self.probe_upper_bound
            );
            self.binary_search(1, self.probe_upper_bound).await
        }
        .instrument(self.span.clone())
        .await
    }

    async fn from_latest_search(&self) -> Option<u64> {
        let Some(url) = self.urls.latest_search_url() else {
            tracing::debug!("No latest-uploads search URL configured");
            return None;
        };

        let Some(outcome) = self.fetcher.fetch(url).await else {
            tracing::error!("Failed to find highest ID by querying URL: {}", url);
            return None;
        };

        if !outcome.is_success() {
            tracing::error!(
                "Failed to find highest ID, HTTP code {}: {}",
                outcome.status,
                url
            );
            return None;
        }

        let id = parse_highest_id(&outcome.body);
        if id.is_none() {
            tracing::error!("Failed to find highest ID by parsing URL content: {}", url);
        }
        id
    }

    /// Binary search for the highest identifier in `[low, high]` whose item
    /// page answers with a 2xx status
    pub async fn binary_search(&self, mut low: u64, mut high: u64) -> Option<u64> {
        if low > high {
            tracing::warn!("Failed to determine highest ID: low must not exceed high");
            return None;
        }

        let mut last_valid = None;
        let mut requests = 0u32;

        while low <= high {
            let mid = low + (high - low) / 2;
            requests += 1;

            if self.probe(mid).await {
                last_valid = Some(mid);
                match mid.checked_add(1) {
                    Some(next) => low = next,
                    None => break,
                }
            } else if mid == 0 {
                break;
            } else {
                high = mid - 1;
            }
        }

        match last_valid {
            Some(id) => tracing::info!("Highest ID found in {} requests is: #{}", requests, id),
            None => tracing::warn!("No valid ID found in {} requests", requests),
        }
        last_valid
    }

    async fn probe(&self, id: u64) -> bool {
        let valid = self
            .fetcher
            .fetch(&self.urls.item_url(id))
            .await
            .is_some_and(|outcome| outcome.is_success());
        tracing::debug!("Probe #{}: {}", id, if valid { "valid" } else { "invalid" });
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvester::fetcher::build_http_client;
    use crate::harvester::gate::ConcurrencyGate;
    use crate::harvester::rate_limiter::RateLimiter;
    use crate::harvester::user_agents::UserAgentPool;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Item pages exist up to and including `highest`
    struct ItemsUpTo {
        highest: u64,
    }

    impl Respond for ItemsUpTo {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let id = request
                .url
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .and_then(|segment| segment.parse::<u64>().ok());

            match id {
                Some(id) if id >= 1 && id <= self.highest => ResponseTemplate::new(200),
                _ => ResponseTemplate::new(404),
            }
        }
    }

    fn finder(server: &MockServer, search: Option<&str>, bound: u64) -> CatalogExtentFinder {
        let fetcher = RetryingFetcher::new(
            build_http_client(Duration::from_secs(5)).unwrap(),
            Arc::new(RateLimiter::disabled()),
            ConcurrencyGate::new(2),
            Arc::new(UserAgentPool::default()),
            1,
            Span::none(),
        );
        let gallery = format!("{}/g/", server.uri());
        let search = search.map(|route| format!("{}{}", server.uri(), route));
        let urls = CatalogUrls::new(&gallery, search.as_deref()).unwrap();
        CatalogExtentFinder::new(Arc::new(fetcher), Arc::new(urls), bound, Span::none())
    }

    #[tokio::test]
    async fn test_search_page_used_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div class="gallery"><a href="/g/1234/">newest</a></div>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let finder = finder(&server, Some("/search/"), 1000);
        assert_eq!(finder.find_highest_id().await, Some(1234));
    }

    #[tokio::test]
    async fn test_binary_search_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ItemsUpTo { highest: 37 })
            .mount(&server)
            .await;

        let finder = finder(&server, Some("/search/"), 1000);
        assert_eq!(finder.find_highest_id().await, Some(37));
    }

    #[tokio::test]
    async fn test_binary_search_without_search_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ItemsUpTo { highest: 1 })
            .mount(&server)
            .await;

        let finder = finder(&server, None, 64);
        assert_eq!(finder.find_highest_id().await, Some(1));
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let finder = finder(&server, None, 100);
        assert_eq!(finder.find_highest_id().await, None);
        assert_eq!(finder.binary_search(10, 5).await, None);
    }
}
