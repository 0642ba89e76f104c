//! Configuration module for Kura-Harvest
//!
//! This module handles loading, parsing, normalizing and validating TOML
//! configuration files.
//!
//! # Example
//!
//! ```no_run
//! use kura_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Items are saved under: {}", config.harvester.save_dir);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CatalogConfig, Config, HarvesterConfig, UserAgentConfig, DEFAULT_MAX_CONCURRENT_REQUESTS,
    DEFAULT_RETRIES, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, FALLBACK_MAX_CONCURRENT_REQUESTS,
    FALLBACK_TIMEOUT_SECS, MIN_REQUESTS_PER_SECOND,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::normalize;
