//! Process-wide minimum-interval request gate
//!
//! Every outgoing request, retries included, passes through one shared
//! [`RateLimiter`]. Permits are granted one at a time and never closer
//! together than `1 / max_rate` seconds; there is no burst allowance.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Longest gap the limiter enforces between two permits
pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Strict minimum-interval rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum gap between two permits; `None` disables limiting
    interval: Option<Duration>,

    /// When the last permit was granted
    last_permit: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing at most `max_per_second` permits per second
    ///
    /// `None`, zero, negative and non-finite rates disable limiting. Rates
    /// slower than one permit per [`MAX_INTERVAL`] are capped at it.
    pub fn new(max_per_second: Option<f64>) -> Self {
        let interval = max_per_second
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .map(|rate| {
                Duration::try_from_secs_f64(1.0 / rate)
                    .map_or(MAX_INTERVAL, |interval| interval.min(MAX_INTERVAL))
            });

        match interval {
            Some(interval) => tracing::info!(
                "Rate limiter enabled: at most one request every {:?}",
                interval
            ),
            None => tracing::info!("Rate limiter disabled: unlimited requests per second"),
        }

        Self {
            interval,
            last_permit: Mutex::new(None),
        }
    }

    /// Creates a limiter that never waits
    pub fn disabled() -> Self {
        Self {
            interval: None,
            last_permit: Mutex::new(None),
        }
    }

    /// Minimum gap between permits, if limiting is enabled
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    /// Waits until a permit may be granted, then records it
    ///
    /// Callers queue on the internal lock in arrival order; each pays
    /// whatever is left of the interval since the previous grant. Returns
    /// immediately when limiting is disabled.
    pub async fn acquire(&self) {
        let Some(interval) = self.interval else {
            return;
        };

        let mut last_permit = self.last_permit.lock().await;

        if let Some(previous) = *last_permit {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }

        *last_permit = Some(Instant::now());
    }
}
