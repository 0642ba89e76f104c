//! Harvester module for fetching catalog items
//!
//! This module contains the core harvesting engine:
//! - Rate limiting and concurrency capping shared by every request
//! - The retrying HTTP fetcher
//! - HTML extraction of metadata, image links and the newest identifier
//! - The two-phase image-set downloader
//! - Per-item scraping and batch orchestration
//! - Catalog extent discovery

pub mod batch;
mod extent;
mod fetcher;
mod gate;
mod images;
mod item;
mod parser;
mod rate_limiter;
mod session;
mod user_agents;

pub use batch::{known_total, BatchOrchestrator, BatchProgress, ScrapeItem};
pub use extent::CatalogExtentFinder;
pub use fetcher::{
    build_http_client, retry_delay, FetchOutcome, RetryingFetcher, MAX_RETRY_DELAY,
};
pub use gate::{ConcurrencyGate, GatePermit};
pub use images::{DownloadTally, ImageSetDownloader, GAMBLE_FAILURE_LIMIT};
pub use item::{ItemOutcome, ItemScraper};
pub use parser::{parse_highest_id, parse_image_link, parse_tags};
pub use rate_limiter::{RateLimiter, MAX_INTERVAL};
pub use session::Harvester;
pub use user_agents::{load_user_agents, UserAgentPool};
