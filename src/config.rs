//! Tunable constants and the runtime configuration bundle.
//!
//! Grace delays and polling windows vary between browser hosts, so every
//! duration here is configuration with a documented default rather than a
//! hard-coded constant inside the services that use it.

use std::time::Duration;

use url::Url;

/// Default local endpoint of the external download manager.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9614";

/// Default HTTP connect timeout for the local endpoint (2 seconds).
///
/// The endpoint is loopback; anything slower than this means the external
/// application is not running.
pub const CONNECT_TIMEOUT_SECS: u64 = 2;

/// Default HTTP read timeout for the local endpoint (5 seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 5;

/// Delay between observing a download and evaluating it (100 ms).
///
/// Some hosts have not populated the final URL at creation time; evaluation
/// waits this long so the record is complete.
pub const CAPTURE_DELAY: Duration = Duration::from_millis(100);

/// Grace window a capture entry survives after the redirect settles (5 seconds).
///
/// Absorbs trailing duplicate notifications for an id that was already
/// canceled.
pub const RELEASE_GRACE: Duration = Duration::from_secs(5);

/// Safety bound on a capture entry while a redirect is in flight (60 seconds).
pub const CAPTURE_TTL: Duration = Duration::from_secs(60);

/// Window during which a failed URL is let through to the browser (10 seconds).
pub const IGNORE_TTL: Duration = Duration::from_secs(10);

/// Minimum interval between remote supported-type refreshes (5 minutes).
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Resolved configuration consumed by the engine services.
///
/// Built from defaults, then overridden by the host (CLI flags in the
/// `dlbridge` binary, constructor arguments in embedding hosts).
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Base URL of the external application's local API.
    pub endpoint: Url,
    /// HTTP connect timeout for dispatch calls.
    pub connect_timeout: Duration,
    /// HTTP read timeout for dispatch calls.
    pub request_timeout: Duration,
    /// Artificial delay before a download record is evaluated.
    pub capture_delay: Duration,
    /// How long a capture entry outlives a settled redirect.
    pub release_grace: Duration,
    /// Upper bound on a capture entry's lifetime.
    pub capture_ttl: Duration,
    /// How long a failed URL stays in the ignore set.
    pub ignore_ttl: Duration,
    /// Minimum interval between successful catalog refreshes.
    pub refresh_interval: Duration,
}

impl Default for BridgeConfig {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_ENDPOINT)
                .expect("default endpoint constant is a valid URL"),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            capture_delay: CAPTURE_DELAY,
            release_grace: RELEASE_GRACE,
            capture_ttl: CAPTURE_TTL,
            ignore_ttl: IGNORE_TTL,
            refresh_interval: REFRESH_INTERVAL,
        }
    }
}

impl BridgeConfig {
    /// Returns a config with the given endpoint and all other fields default.
    #[must_use]
    pub fn with_endpoint(endpoint: Url) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint_parses() {
        let url = Url::parse(DEFAULT_ENDPOINT).unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.port(), Some(9614));
    }

    #[test]
    fn test_default_config_values() {
        let config = BridgeConfig::default();
        assert_eq!(config.capture_delay, Duration::from_millis(100));
        assert_eq!(config.refresh_interval, Duration::from_secs(300));
        assert!(
            config.release_grace < config.capture_ttl,
            "grace window must be shorter than the capture safety bound"
        );
    }

    #[test]
    fn test_with_endpoint_overrides_only_endpoint() {
        let url = Url::parse("http://127.0.0.1:7777").unwrap();
        let config = BridgeConfig::with_endpoint(url.clone());
        assert_eq!(config.endpoint, url);
        assert_eq!(config.ignore_ttl, IGNORE_TTL);
    }
}
