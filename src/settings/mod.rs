//! Settings model and the in-memory cache the decision engine consults.
//!
//! [`SettingsCache`] owns the live [`Settings`] value. All mutation goes
//! through its methods; collaborators read through the sync accessors, which
//! never block on I/O.

mod store;

pub use store::{
    ChangeListener, JsonFileStore, MemoryStore, SettingsError, SettingsStore, Subscription,
};

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::BridgeConfig;
use crate::dispatch::DispatchClient;

/// Extension catalog used until the external application reports its own.
pub const DEFAULT_SUPPORTED_TYPES: &[&str] = &[
    ".3gp", ".7z", ".avi", ".bz2", ".deb", ".dmg", ".doc", ".docx", ".exe", ".flv", ".gz",
    ".iso", ".jar", ".mkv", ".mov", ".mp3", ".mp4", ".mpg", ".msi", ".pdf", ".ppt", ".pptx",
    ".rar", ".rpm", ".tar", ".wav", ".webm", ".wmv", ".xls", ".xlsx", ".zip",
];

/// Persisted engine settings.
///
/// `supported_file_types` entries are lowercase, dot-prefixed and free of
/// duplicates; [`Settings::normalize`] enforces this at every ingest point,
/// which is what makes the membership test case-insensitive by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Whether interception is active at all.
    pub enabled: bool,
    /// Ordered extension catalog the external application handles.
    pub supported_file_types: Vec<String>,
    /// Unix timestamp (ms) of the last update check, 0 when never run.
    pub last_check_for_updates: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            supported_file_types: DEFAULT_SUPPORTED_TYPES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            last_check_for_updates: 0,
        }
    }
}

impl Settings {
    /// Rewrites the type catalog into canonical form: lowercase,
    /// dot-prefixed, order-preserving dedup, empties dropped.
    pub fn normalize(&mut self) {
        let mut canonical = Vec::with_capacity(self.supported_file_types.len());
        for raw in &self.supported_file_types {
            if let Some(ext) = normalize_extension(raw)
                && !canonical.contains(&ext)
            {
                canonical.push(ext);
            }
        }
        self.supported_file_types = canonical;
    }

    /// Returns the canonical form of this document.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Case-insensitive membership test against the type catalog.
    #[must_use]
    pub fn is_supported(&self, ext: &str) -> bool {
        normalize_extension(ext)
            .is_some_and(|ext| self.supported_file_types.contains(&ext))
    }
}

/// Canonicalizes a raw extension: trim, lowercase, ensure a leading dot.
pub(crate) fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!(".{}", trimmed.to_lowercase()))
}

/// In-memory mirror of the persisted settings plus the throttled remote
/// catalog refresh.
///
/// Accessors are synchronous and lock-held only briefly; every await happens
/// outside the state lock.
pub struct SettingsCache {
    store: Arc<dyn SettingsStore>,
    dispatch: Arc<DispatchClient>,
    state: RwLock<Settings>,
    /// Serializes refreshes and records the instant of the last successful
    /// one. Held across the fetch so a burst of callers performs one call.
    refresh_gate: Mutex<Option<Instant>>,
    refresh_interval: Duration,
}

impl SettingsCache {
    /// Builds the cache from the persisted document, falling back to
    /// defaults when nothing was saved yet or the document cannot be read.
    ///
    /// Load failure is non-fatal: the engine must come up even with a
    /// corrupt or unreadable document, so it logs and starts from defaults.
    pub async fn load(
        store: Arc<dyn SettingsStore>,
        dispatch: Arc<DispatchClient>,
        config: &BridgeConfig,
    ) -> Self {
        let initial = match store.load().await {
            Ok(Some(persisted)) => persisted,
            Ok(None) => {
                info!("no persisted settings; starting from defaults");
                Settings::default()
            }
            Err(e) => {
                warn!(error = %e, "failed to load settings; starting from defaults");
                Settings::default()
            }
        };

        Self {
            store,
            dispatch,
            state: RwLock::new(initial.normalized()),
            refresh_gate: Mutex::new(None),
            refresh_interval: config.refresh_interval,
        }
    }

    /// Whether interception is active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.read_state(|s| s.enabled)
    }

    /// Whether `ext` is in the supported catalog (case-insensitive).
    #[must_use]
    pub fn is_supported_type(&self, ext: &str) -> bool {
        self.read_state(|s| s.is_supported(ext))
    }

    /// A copy of the current settings.
    #[must_use]
    pub fn snapshot(&self) -> Settings {
        self.read_state(Clone::clone)
    }

    /// Flips the enabled flag, persisting before the live value changes.
    ///
    /// Returns the new state. On persistence failure the prior state stays
    /// visible and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the store rejects the write.
    pub async fn toggle_enabled(&self) -> Result<bool, SettingsError> {
        let mut candidate = self.snapshot();
        candidate.enabled = !candidate.enabled;

        self.store.save(&candidate).await?;
        let enabled = candidate.enabled;
        self.replace_state(candidate);
        info!(enabled, "interception toggled");
        Ok(enabled)
    }

    /// Records the timestamp of the last update check.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the store rejects the write.
    pub async fn set_last_check_for_updates(&self, timestamp_ms: u64) -> Result<(), SettingsError> {
        let mut candidate = self.snapshot();
        candidate.last_check_for_updates = timestamp_ms;
        self.store.save(&candidate).await?;
        self.replace_state(candidate);
        Ok(())
    }

    /// Refreshes the supported-type catalog from the external application.
    ///
    /// A non-forced call inside `refresh_interval` of the last successful
    /// refresh is a no-op returning cached data, which bounds remote calls
    /// under a burst of events. Fetch failure keeps the stale catalog; an
    /// empty catalog is treated the same way, since wiping the list on a
    /// misbehaving reply would silently disable every capture.
    ///
    /// The fresh catalog takes effect in memory even when persisting it
    /// fails; the on-disk copy is then merely behind.
    #[instrument(skip(self))]
    pub async fn refresh_supported_types(&self, force: bool) -> Settings {
        let mut last_success = self.refresh_gate.lock().await;

        if !force
            && let Some(at) = *last_success
            && at.elapsed() < self.refresh_interval
        {
            debug!("catalog refresh throttled; serving cached data");
            return self.snapshot();
        }

        match self.dispatch.fetch_supported_types().await {
            Ok(types) if !types.is_empty() => {
                let mut candidate = self.snapshot();
                candidate.supported_file_types = types;
                candidate.normalize();

                info!(
                    count = candidate.supported_file_types.len(),
                    "supported-type catalog refreshed"
                );
                self.replace_state(candidate.clone());
                *last_success = Some(Instant::now());

                if let Err(e) = self.store.save(&candidate).await {
                    warn!(error = %e, "failed to persist refreshed catalog; memory copy stays live");
                }
            }
            Ok(_) => warn!("external application reported an empty catalog; keeping cached data"),
            Err(e) => warn!(error = %e, "supported-type refresh failed; keeping cached data"),
        }

        self.snapshot()
    }

    fn read_state<T>(&self, f: impl FnOnce(&Settings) -> T) -> T {
        let guard = self
            .state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&guard)
    }

    fn replace_state(&self, settings: Settings) {
        let mut guard = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = settings;
    }
}

impl std::fmt::Debug for SettingsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsCache")
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}
