use crate::config::types::{
    CatalogConfig, Config, HarvesterConfig, FALLBACK_MAX_CONCURRENT_REQUESTS,
    FALLBACK_TIMEOUT_SECS, MIN_REQUESTS_PER_SECOND,
};
use crate::config::DEFAULT_RETRIES;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvester_config(&config.harvester)?;
    validate_catalog_config(&config.catalog)?;
    Ok(())
}

/// Replaces out-of-range values that have a documented fallback
///
/// Each substitution is logged at WARN level.
pub fn normalize(mut config: Config) -> Config {
    let harvester = &mut config.harvester;

    if harvester.max_concurrent_requests < 1 {
        tracing::warn!(
            "max-concurrent-requests must be at least 1. Defaulted to {}.",
            FALLBACK_MAX_CONCURRENT_REQUESTS
        );
        harvester.max_concurrent_requests = FALLBACK_MAX_CONCURRENT_REQUESTS;
    }

    if harvester.timeout_secs < 1 {
        tracing::warn!(
            "timeout-secs invalid, defaulting to {}s",
            FALLBACK_TIMEOUT_SECS
        );
        harvester.timeout_secs = FALLBACK_TIMEOUT_SECS;
    }

    if harvester.retries < 1 {
        tracing::warn!("retries must be at least 1. Defaulted to {}.", DEFAULT_RETRIES);
        harvester.retries = DEFAULT_RETRIES;
    }

    if harvester.max_requests_per_second.is_some() && harvester.effective_rate().is_none() {
        tracing::warn!("max-requests-per-second is not positive; rate limiting disabled");
        harvester.max_requests_per_second = None;
    }

    if let Some(rate) = harvester.effective_rate() {
        if rate < MIN_REQUESTS_PER_SECOND {
            tracing::warn!(
                "max-requests-per-second of {} is below one request per hour. Raised to {}.",
                rate,
                MIN_REQUESTS_PER_SECOND
            );
            harvester.max_requests_per_second = Some(MIN_REQUESTS_PER_SECOND);
        }
    }

    if matches!(harvester.batch_size, Some(0)) {
        tracing::warn!("batch-size of 0 ignored; using twice the concurrency cap");
        harvester.batch_size = None;
    }

    if !config.catalog.gallery_url.ends_with('/') {
        config.catalog.gallery_url.push('/');
    }

    config
}

/// Validates harvester configuration
fn validate_harvester_config(config: &HarvesterConfig) -> Result<(), ConfigError> {
    if config.save_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "save-dir cannot be empty".to_string(),
        ));
    }

    if config.batch_pause_min_ms > config.batch_pause_max_ms {
        return Err(ConfigError::Validation(format!(
            "batch-pause-min-ms ({}) must not exceed batch-pause-max-ms ({})",
            config.batch_pause_min_ms, config.batch_pause_max_ms
        )));
    }

    Ok(())
}

/// Validates catalog configuration
fn validate_catalog_config(config: &CatalogConfig) -> Result<(), ConfigError> {
    validate_http_url("gallery-url", &config.gallery_url)?;

    if let Some(search) = &config.latest_search_url {
        validate_http_url("latest-search-url", search)?;
    }

    if config.probe_upper_bound < 1 {
        return Err(ConfigError::Validation(format!(
            "probe-upper-bound must be >= 1, got {}",
            config.probe_upper_bound
        )));
    }

    let name = config.meta_file_name.trim();
    if name.is_empty() || name.contains('/') || name.contains('\\') {
        return Err(ConfigError::Validation(format!(
            "meta-file-name must be a plain file name, got '{}'",
            config.meta_file_name
        )));
    }

    Ok(())
}

/// Checks that `value` is an absolute http(s) URL
fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", key, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            key, value
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{UserAgentConfig, DEFAULT_TIMEOUT_SECS};

    fn create_test_config() -> Config {
        Config {
            harvester: HarvesterConfig {
                save_dir: "./catalog".to_string(),
                max_concurrent_requests: 3,
                max_requests_per_second: Some(3.0),
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                retries: 3,
                batch_size: None,
                batch_pause_min_ms: 1500,
                batch_pause_max_ms: 2500,
            },
            user_agent: UserAgentConfig::default(),
            catalog: CatalogConfig {
                gallery_url: "https://catalog.example.net/g/".to_string(),
                latest_search_url: None,
                probe_upper_bound: 1000,
                meta_file_name: "meta.json".to_string(),
            },
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(validate(&create_test_config()).is_ok());
    }

    #[test]
    fn test_validate_empty_save_dir() {
        let mut config = create_test_config();
        config.harvester.save_dir = "  ".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_pause_window() {
        let mut config = create_test_config();
        config.harvester.batch_pause_min_ms = 3000;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_gallery_url() {
        let mut config = create_test_config();
        config.catalog.gallery_url = "not a url".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));

        config.catalog.gallery_url = "ftp://catalog.example.net/g/".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_validate_meta_file_name() {
        let mut config = create_test_config();
        config.catalog.meta_file_name = "nested/meta.json".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_normalize_fallbacks() {
        let mut config = create_test_config();
        config.harvester.max_concurrent_requests = 0;
        config.harvester.timeout_secs = 0;
        config.harvester.retries = 0;
        config.harvester.max_requests_per_second = Some(-1.0);
        config.harvester.batch_size = Some(0);
        config.catalog.gallery_url = "https://catalog.example.net/g".to_string();

        let config = normalize(config);
        assert_eq!(
            config.harvester.max_concurrent_requests,
            FALLBACK_MAX_CONCURRENT_REQUESTS
        );
        assert_eq!(config.harvester.timeout_secs, FALLBACK_TIMEOUT_SECS);
        assert_eq!(config.harvester.retries, DEFAULT_RETRIES);
        assert_eq!(config.harvester.max_requests_per_second, None);
        assert_eq!(config.harvester.batch_size, None);
        assert_eq!(config.catalog.gallery_url, "https://catalog.example.net/g/");
    }

    #[test]
    fn test_normalize_tiny_rate() {
        let mut config = create_test_config();
        config.harvester.max_requests_per_second = Some(1e-30);

        let config = normalize(config);
        assert_eq!(
            config.harvester.effective_rate(),
            Some(MIN_REQUESTS_PER_SECOND)
        );

        let mut config = create_test_config();
        config.harvester.max_requests_per_second = Some(0.5);
        assert_eq!(normalize(config).harvester.effective_rate(), Some(0.5));
    }

    #[test]
    fn test_effective_batch_size() {
        let mut config = create_test_config();
        assert_eq!(config.harvester.effective_batch_size(), 6);

        config.harvester.batch_size = Some(80);
        assert_eq!(config.harvester.effective_batch_size(), 80);
    }
}
