//! Bounded-lifetime membership registries guarding download handling.
//!
//! Two sets keep the engine from acting twice on the same download:
//! - the capture set proves a browser download id has already been canceled;
//! - the ignore set marks URLs whose redirect failed, so the browser's own
//!   retry of the same URL passes through instead of looping.
//!
//! An entry's absence only ever means "clear to capture"; nothing relies on
//! expiry actually freeing memory (see [`ExpiringSet`]).

mod expiring;

pub use expiring::ExpiringSet;

use std::time::Duration;

use tracing::debug;

use crate::config::BridgeConfig;
use crate::intercept::DownloadId;

/// Process-wide arbiter of "have we acted on this download".
#[derive(Debug)]
pub struct DownloadRegistry {
    captured: ExpiringSet<DownloadId>,
    ignored: ExpiringSet<String>,
    capture_ttl: Duration,
    release_grace: Duration,
    ignore_ttl: Duration,
}

impl DownloadRegistry {
    #[must_use]
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            captured: ExpiringSet::new(),
            ignored: ExpiringSet::new(),
            capture_ttl: config.capture_ttl,
            release_grace: config.release_grace,
            ignore_ttl: config.ignore_ttl,
        }
    }

    /// Atomically claims `id` for capture.
    ///
    /// Returns `true` at most once per id within the entry's lifetime; a
    /// duplicate notification processed concurrently gets `false` and must
    /// not cancel the download again.
    pub fn try_capture(&self, id: DownloadId) -> bool {
        let claimed = self.captured.try_insert(id, self.capture_ttl);
        if !claimed {
            debug!(id, "download already captured; duplicate notification absorbed");
        }
        claimed
    }

    /// Marks the redirect for `id` as settled.
    ///
    /// The entry is not removed immediately: its deadline is re-armed to the
    /// grace window so a trailing duplicate notification for the same id is
    /// still absorbed. Expiry then happens lazily, no timer involved.
    pub fn release_capture(&self, id: DownloadId) {
        self.captured.rearm(&id, self.release_grace);
    }

    /// Records that redirection for `url` failed and the browser should keep
    /// its next attempt.
    pub fn mark_ignored(&self, url: &str) {
        debug!(url, "marking url ignored for browser fallback");
        self.ignored.insert(url.to_string(), self.ignore_ttl);
    }

    /// Whether `url` was recently released back to the browser.
    #[must_use]
    pub fn is_ignored(&self, url: &str) -> bool {
        self.ignored.contains(&url.to_string())
    }

    /// Drops expired entries from both sets. Memory bound only.
    pub fn sweep(&self) {
        self.captured.sweep();
        self.ignored.sweep();
    }
}
