//! Adaptive per-host rate limiter.
//!
//! Tracks request timing per host and adapts delays based on responses.
//! Backs off on 429/503 and server errors, gradually recovers on success.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

/// Configuration for rate limiting behavior.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Base delay between requests to the same host.
    pub base_delay: Duration,
    /// Maximum delay (ceiling for backoff).
    pub max_delay: Duration,
    /// Multiplier for exponential backoff on rate limit.
    pub backoff_multiplier: f64,
    /// Multiplier for recovery on success (< 1.0 to decrease delay).
    pub recovery_multiplier: f64,
    /// Number of consecutive successes before reducing delay.
    pub recovery_threshold: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.5,
            recovery_threshold: 5,
        }
    }
}

/// State for a single host.
#[derive(Debug, Clone)]
struct HostState {
    current_delay: Duration,
    next_allowed: Option<Instant>,
    consecutive_successes: u32,
    in_backoff: bool,
}

impl HostState {
    fn new(base_delay: Duration) -> Self {
        Self {
            current_delay: base_delay,
            next_allowed: None,
            consecutive_successes: 0,
            in_backoff: false,
        }
    }
}

/// Shared adaptive rate limiter keyed by URL host.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    hosts: Arc<RwLock<HashMap<String, HostState>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            hosts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Wait until a request to `url` is allowed. Returns the host key used
    /// for subsequent `report_*` calls, or `None` for unparseable URLs.
    pub async fn acquire(&self, url: &str) -> Option<String> {
        let host = Url::parse(url).ok()?.host_str()?.to_string();

        let wait = {
            let mut hosts = self.hosts.write().await;
            let state = hosts
                .entry(host.clone())
                .or_insert_with(|| HostState::new(self.config.base_delay));

            let now = Instant::now();
            let wait = match state.next_allowed {
                Some(at) if at > now => at - now,
                _ => Duration::ZERO,
            };
            // Reserve the slot before sleeping so concurrent callers queue up
            state.next_allowed = Some(now + wait + state.current_delay);
            wait
        };

        if !wait.is_zero() {
            debug!(host = %host, wait_ms = wait.as_millis() as u64, "Rate limiter delaying request");
            tokio::time::sleep(wait).await;
        }

        Some(host)
    }

    /// Record a successful response; may recover from backoff.
    pub async fn report_success(&self, host: &str) {
        let mut hosts = self.hosts.write().await;
        let Some(state) = hosts.get_mut(host) else {
            return;
        };

        state.consecutive_successes += 1;
        if state.in_backoff && state.consecutive_successes >= self.config.recovery_threshold {
            let reduced = state.current_delay.mul_f64(self.config.recovery_multiplier);
            state.current_delay = reduced.max(self.config.base_delay);
            state.consecutive_successes = 0;
            if state.current_delay <= self.config.base_delay {
                state.in_backoff = false;
                debug!(host, "Rate limiter recovered to base delay");
            }
        }
    }

    /// Record a definite rate limit response (429/503).
    pub async fn report_rate_limit(&self, host: &str, status: u16) {
        let mut hosts = self.hosts.write().await;
        let Some(state) = hosts.get_mut(host) else {
            return;
        };

        let raised = state.current_delay.mul_f64(self.config.backoff_multiplier);
        state.current_delay = raised.min(self.config.max_delay);
        state.in_backoff = true;
        state.consecutive_successes = 0;
        warn!(
            host,
            status,
            delay_ms = state.current_delay.as_millis() as u64,
            "Rate limited, backing off"
        );
    }

    /// Record a server error (5xx); milder backoff than a rate limit.
    pub async fn report_server_error(&self, host: &str) {
        let mut hosts = self.hosts.write().await;
        let Some(state) = hosts.get_mut(host) else {
            return;
        };

        let raised = state.current_delay.mul_f64(1.5);
        state.current_delay = raised.min(self.config.max_delay);
        state.in_backoff = true;
        state.consecutive_successes = 0;
    }

    #[cfg(test)]
    async fn current_delay(&self, host: &str) -> Option<Duration> {
        self.hosts.read().await.get(host).map(|s| s.current_delay)
    }
}
