//! Persistence boundary for settings.
//!
//! The engine never touches storage directly; it talks to a [`SettingsStore`]
//! that can load, save, and notify about changes. Two implementations ship:
//! a JSON file store for real hosts and an in-memory store for ephemeral
//! hosts and tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::Settings;

/// Errors from loading or persisting the settings document.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// File system error reading or writing the document.
    #[error("IO error accessing settings at {path}: {source}")]
    Io {
        /// The settings path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The document exists but does not parse.
    #[error("settings document malformed: {source}")]
    Malformed {
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

impl SettingsError {
    /// Creates an IO error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a malformed-document error.
    pub fn malformed(source: serde_json::Error) -> Self {
        Self::Malformed { source }
    }
}

/// Callback invoked with the new value after a successful save.
pub type ChangeListener = Box<dyn Fn(&Settings) + Send + Sync>;

/// Registered listeners, shared between a store and its subscriptions.
#[derive(Default)]
struct ListenerSet {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, ChangeListener)>>,
}

impl ListenerSet {
    fn subscribe(self: &Arc<Self>, listener: ChangeListener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((id, listener));
        }
        Subscription {
            id,
            listeners: Arc::downgrade(self),
        }
    }

    fn notify(&self, settings: &Settings) {
        if let Ok(listeners) = self.listeners.lock() {
            for (_, listener) in listeners.iter() {
                listener(settings);
            }
        }
    }

    fn remove(&self, id: u64) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|(listener_id, _)| *listener_id != id);
        }
    }
}

/// Handle for a registered change listener; dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerSet>,
}

impl Subscription {
    /// Explicitly unsubscribes. Equivalent to dropping the handle.
    pub fn dispose(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Data-access contract for the persisted settings document.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Loads the persisted document, `None` when nothing was saved yet.
    async fn load(&self) -> Result<Option<Settings>, SettingsError>;

    /// Persists the document. Listeners fire only when the write succeeded.
    async fn save(&self, settings: &Settings) -> Result<(), SettingsError>;

    /// Registers a change listener; the returned handle unsubscribes on drop.
    fn on_change(&self, listener: ChangeListener) -> Subscription;
}

/// Settings persisted as a JSON document on disk.
///
/// Writes go to a sibling temp file first and replace the document with a
/// rename, so a crash mid-write never leaves a truncated document behind.
pub struct JsonFileStore {
    path: PathBuf,
    listeners: Arc<ListenerSet>,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            listeners: Arc::new(ListenerSet::default()),
        }
    }

    /// The document path this store reads and writes.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn load(&self) -> Result<Option<Settings>, SettingsError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SettingsError::io(&self.path, e)),
        };
        let settings: Settings =
            serde_json::from_slice(&bytes).map_err(SettingsError::malformed)?;
        Ok(Some(settings.normalized()))
    }

    async fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let body = serde_json::to_vec_pretty(settings).map_err(SettingsError::malformed)?;

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &body)
            .await
            .map_err(|e| SettingsError::io(&tmp_path, e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| SettingsError::io(&self.path, e))?;

        debug!(path = %self.path.display(), "settings persisted");
        self.listeners.notify(settings);
        Ok(())
    }

    fn on_change(&self, listener: ChangeListener) -> Subscription {
        self.listeners.subscribe(listener)
    }
}

/// Ephemeral in-memory store for hosts without persistence and for tests.
#[derive(Default)]
pub struct MemoryStore {
    current: Mutex<Option<Settings>>,
    listeners: Arc<ListenerSet>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with a document.
    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            current: Mutex::new(Some(settings)),
            listeners: Arc::new(ListenerSet::default()),
        }
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> Result<Option<Settings>, SettingsError> {
        Ok(self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    async fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        *self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(settings.clone());
        self.listeners.notify(settings);
        Ok(())
    }

    fn on_change(&self, listener: ChangeListener) -> Subscription {
        self.listeners.subscribe(listener)
    }
}
