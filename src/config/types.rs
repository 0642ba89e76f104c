use serde::Deserialize;

/// Concurrency cap used when `max-concurrent-requests` is not set
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: u32 = 3;

/// Concurrency cap substituted for an invalid `max-concurrent-requests`
pub const FALLBACK_MAX_CONCURRENT_REQUESTS: u32 = 10;

/// Request timeout used when `timeout-secs` is not set
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Request timeout substituted for an invalid `timeout-secs`
pub const FALLBACK_TIMEOUT_SECS: u64 = 10;

/// Slowest rate accepted for `max-requests-per-second` (one request per hour)
pub const MIN_REQUESTS_PER_SECOND: f64 = 1.0 / 3600.0;

/// Fetch attempts per URL
pub const DEFAULT_RETRIES: u32 = 3;

/// User agent sent when no list is available
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.0; Win64; x64; en-US) AppleWebKit/603.19 (KHTML, like Gecko) Chrome/50.0.2331.247 Safari/601";

/// Main configuration structure for Kura-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub harvester: HarvesterConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub catalog: CatalogConfig,
}

/// Harvest engine behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct HarvesterConfig {
    /// Root directory holding one sub-directory per item
    #[serde(rename = "save-dir")]
    pub save_dir: String,

    /// Maximum number of requests in flight at once
    #[serde(rename = "max-concurrent-requests", default = "default_max_concurrent")]
    pub max_concurrent_requests: u32,

    /// Maximum number of requests per second (unset disables rate limiting)
    #[serde(rename = "max-requests-per-second", default)]
    pub max_requests_per_second: Option<f64>,

    /// Per-request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per URL before giving up
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Number of items scraped concurrently per batch
    #[serde(rename = "batch-size", default)]
    pub batch_size: Option<usize>,

    /// Lower bound of the randomized pause between batches (milliseconds)
    #[serde(rename = "batch-pause-min-ms", default = "default_pause_min_ms")]
    pub batch_pause_min_ms: u64,

    /// Upper bound of the randomized pause between batches (milliseconds)
    #[serde(rename = "batch-pause-max-ms", default = "default_pause_max_ms")]
    pub batch_pause_max_ms: u64,
}

impl HarvesterConfig {
    /// Batch size actually used: the configured one, or twice the concurrency cap
    pub fn effective_batch_size(&self) -> usize {
        match self.batch_size {
            Some(size) if size > 0 => size,
            _ => (self.max_concurrent_requests.max(1) as usize) * 2,
        }
    }

    /// Rate limit actually used; `None` when limiting is disabled
    pub fn effective_rate(&self) -> Option<f64> {
        self.max_requests_per_second
            .filter(|rate| rate.is_finite() && *rate > 0.0)
    }
}

/// User agent selection
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Text file with one user agent per line
    #[serde(rename = "list-path", default)]
    pub list_path: Option<String>,

    /// User agent used when the list is missing or empty
    #[serde(default = "default_user_agent")]
    pub fallback: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            list_path: None,
            fallback: default_user_agent(),
        }
    }
}

/// Remote catalog layout
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Base URL under which `{id}/` is an item page and `{id}/1/` its first image page
    #[serde(rename = "gallery-url")]
    pub gallery_url: String,

    /// Search page listing the most recently added item first
    #[serde(rename = "latest-search-url", default)]
    pub latest_search_url: Option<String>,

    /// Upper bound of the identifier range probed by the binary-search fallback
    #[serde(rename = "probe-upper-bound", default = "default_probe_upper_bound")]
    pub probe_upper_bound: u64,

    /// File name of the per-item metadata document
    #[serde(rename = "meta-file-name", default = "default_meta_file_name")]
    pub meta_file_name: String,
}

fn default_max_concurrent() -> u32 {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_pause_min_ms() -> u64 {
    1500
}

fn default_pause_max_ms() -> u64 {
    2500
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_probe_upper_bound() -> u64 {
    1_000_000
}

fn default_meta_file_name() -> String {
    "meta.json".to_string()
}
