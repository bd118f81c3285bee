//! Browser-side boundary: the download record the browser owns and the
//! control surface this engine calls back into.
//!
//! Hosts deliver their native download callbacks — whether a pre-creation
//! naming event, a creation event, or both — as [`DownloadRecord`] values
//! through a single normalized entry point, so the decision engine never
//! branches on which browser it is running under.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier the browser assigns to a download.
pub type DownloadId = u64;

/// Snapshot of a browser download, read-only to this engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadRecord {
    /// Browser-assigned download id.
    pub id: DownloadId,
    /// Originally requested URL.
    pub url: String,
    /// Final URL after redirects, when the host has resolved it.
    pub final_url: Option<String>,
    /// Filename the browser suggests for saving.
    pub filename: Option<String>,
    /// Declared MIME type, when any.
    pub mime: Option<String>,
    /// Referrer of the request, when any.
    pub referrer: Option<String>,
    /// URL of the page that initiated the download, when known.
    pub page_url: Option<String>,
}

impl Default for DownloadRecord {
    fn default() -> Self {
        Self {
            id: 0,
            url: String::new(),
            final_url: None,
            filename: None,
            mime: None,
            referrer: None,
            page_url: None,
        }
    }
}

impl DownloadRecord {
    /// The URL the download will actually hit: the resolved final URL when
    /// present and non-empty, the requested URL otherwise.
    #[must_use]
    pub fn effective_url(&self) -> &str {
        match self.final_url.as_deref() {
            Some(resolved) if !resolved.is_empty() => resolved,
            _ => &self.url,
        }
    }
}

/// How the browser should resolve a filename collision when a suggestion is
/// applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Replace the existing file; suppresses the save dialog.
    Overwrite,
    /// Let the browser pick a unique name.
    Uniquify,
    /// Ask the user.
    Prompt,
}

/// A browser-side control call failed.
///
/// Never fatal: the engine logs these and carries on, since the browser may
/// have already torn the download down on its own.
#[derive(Debug, Error)]
#[error("browser {call} call failed for download {context}: {message}")]
pub struct BrowserError {
    /// Which control call failed.
    pub call: &'static str,
    /// Download id or URL the call targeted.
    pub context: String,
    /// Host-provided failure detail.
    pub message: String,
}

impl BrowserError {
    /// Creates an error for a failed control call.
    pub fn call_failed(
        call: &'static str,
        context: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            call,
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Control surface into the hosting browser.
///
/// One adapter exists per host; capability probes cover the places where
/// hosts genuinely differ, so the decision engine stays host-agnostic.
#[async_trait]
pub trait BrowserControl: Send + Sync {
    /// Whether this host delivers a pre-creation naming callback that can
    /// carry a filename suggestion and conflict policy.
    fn supports_filename_suggestion(&self) -> bool {
        false
    }

    /// Cancels an in-progress native download.
    async fn cancel(&self, id: DownloadId) -> Result<(), BrowserError>;

    /// Erases a download from the browser's download list.
    async fn erase(&self, id: DownloadId) -> Result<(), BrowserError>;

    /// Applies a filename suggestion with the given conflict policy.
    ///
    /// Only called when [`supports_filename_suggestion`] returns true.
    ///
    /// [`supports_filename_suggestion`]: Self::supports_filename_suggestion
    async fn suggest_filename(
        &self,
        id: DownloadId,
        name: &str,
        conflict: ConflictPolicy,
    ) -> Result<(), BrowserError>;

    /// Opens `url` as a normal page load in a new tab.
    async fn open_in_new_tab(&self, url: &str) -> Result<(), BrowserError>;
}
