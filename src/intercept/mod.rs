//! The capture decision engine.
//!
//! Every browser download notification funnels into
//! [`DownloadInterceptor::on_download_observed`]. Per id the flow is
//! `Unseen → Evaluating → {CaptureInFlight → Settled} | PassedThrough`:
//! evaluation either leaves the native download untouched (pass-through) or
//! cancels it, hands a redirect to the external application, and falls back
//! to a plain browser tab when that hand-off fails. The registry is the sole
//! guard against acting twice on one id, which makes hosts that deliver two
//! notifications per download behave exactly like hosts that deliver one.

mod browser;

pub use browser::{BrowserControl, BrowserError, ConflictPolicy, DownloadId, DownloadRecord};

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::BridgeConfig;
use crate::dispatch::{DispatchClient, RedirectRequest};
use crate::filetype;
use crate::registry::DownloadRegistry;
use crate::settings::SettingsCache;

/// Why a download was left to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    /// Interception is switched off.
    Disabled,
    /// The effective URL uses a scheme this engine cannot proxy.
    UnsupportedScheme,
    /// The URL was recently released back to the browser after a failed
    /// redirect.
    Ignored,
    /// No signal resolved to a supported file type.
    UnsupportedType,
    /// Another notification for the same id already acted.
    Duplicate,
}

/// Terminal result of evaluating one download notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptOutcome {
    /// The native download was canceled and the redirect was accepted.
    Captured,
    /// The native download proceeds untouched.
    PassedThrough(PassReason),
    /// The redirect failed after capture; the URL was reopened in a tab.
    FallbackToBrowser,
}

/// Decides, per download, whether to hand it to the external application.
///
/// Explicitly constructed with its collaborators; process-wide sharing is the
/// host's choice, not an ambient import.
pub struct DownloadInterceptor {
    settings: Arc<SettingsCache>,
    registry: Arc<DownloadRegistry>,
    dispatch: Arc<DispatchClient>,
    browser: Arc<dyn BrowserControl>,
    config: BridgeConfig,
}

impl DownloadInterceptor {
    #[must_use]
    pub fn new(
        settings: Arc<SettingsCache>,
        registry: Arc<DownloadRegistry>,
        dispatch: Arc<DispatchClient>,
        browser: Arc<dyn BrowserControl>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            settings,
            registry,
            dispatch,
            browser,
            config,
        }
    }

    /// Handles one download lifecycle notification.
    ///
    /// Safe to call any number of times per id, from whichever notification
    /// the host delivers first; duplicates are absorbed, not errors.
    #[instrument(skip(self, record), fields(id = record.id, url = %record.effective_url()))]
    pub async fn on_download_observed(&self, record: DownloadRecord) -> InterceptOutcome {
        // Hosts that fire the creation event before the final URL is
        // populated need a moment for the record to settle.
        if !self.config.capture_delay.is_zero() {
            tokio::time::sleep(self.config.capture_delay).await;
        }

        if !self.settings.is_enabled() {
            debug!("interception disabled; passing through");
            return InterceptOutcome::PassedThrough(PassReason::Disabled);
        }

        // Opportunistic, throttled: a burst of downloads costs one fetch.
        self.settings.refresh_supported_types(false).await;

        let url = record.effective_url().to_string();
        if !is_proxyable_scheme(&url) {
            debug!("scheme not proxyable; passing through");
            return InterceptOutcome::PassedThrough(PassReason::UnsupportedScheme);
        }

        if self.registry.is_ignored(&url) {
            info!("url recently failed redirect; letting the browser keep it");
            return InterceptOutcome::PassedThrough(PassReason::Ignored);
        }

        let Some(file_type) =
            filetype::resolve_file_type(&record, |ext| self.settings.is_supported_type(ext))
        else {
            debug!("no supported file type resolved; passing through");
            return InterceptOutcome::PassedThrough(PassReason::UnsupportedType);
        };

        if !self.registry.try_capture(record.id) {
            // A duplicate notification raced us here. The download is already
            // being handled; only keep the save dialog suppressed.
            self.apply_filename_suggestion(&record).await;
            return InterceptOutcome::PassedThrough(PassReason::Duplicate);
        }

        info!(file_type = %file_type, "capturing download");
        self.apply_filename_suggestion(&record).await;
        self.cancel_and_erase(record.id).await;

        let request = build_redirect(&record, &url);
        let outcome = match self.dispatch.send(&[request]).await {
            Ok(ack) => {
                debug!(message = ?ack.message, "redirect accepted");
                InterceptOutcome::Captured
            }
            Err(e) => {
                warn!(error = %e, "redirect dispatch failed; falling back to browser");
                self.registry.mark_ignored(&url);
                if let Err(open_err) = self.browser.open_in_new_tab(&url).await {
                    warn!(error = %open_err, "browser fallback open failed");
                }
                InterceptOutcome::FallbackToBrowser
            }
        };

        // Keep the capture entry through the grace window so a trailing
        // duplicate notification for this id is still absorbed.
        self.registry.release_capture(record.id);
        outcome
    }

    /// Suppresses the browser's save dialog on hosts that support it.
    async fn apply_filename_suggestion(&self, record: &DownloadRecord) {
        if !self.browser.supports_filename_suggestion() {
            return;
        }
        let Some(name) = record.filename.as_deref().filter(|n| !n.is_empty()) else {
            return;
        };
        if let Err(e) = self
            .browser
            .suggest_filename(record.id, name, ConflictPolicy::Overwrite)
            .await
        {
            warn!(error = %e, "filename suggestion failed");
        }
    }

    /// Removes the native download. Failures are logged and tolerated: the
    /// browser may already have torn the download down on its own.
    async fn cancel_and_erase(&self, id: DownloadId) {
        if let Err(e) = self.browser.cancel(id).await {
            warn!(error = %e, "cancel failed");
        }
        if let Err(e) = self.browser.erase(id).await {
            warn!(error = %e, "erase failed");
        }
    }
}

impl std::fmt::Debug for DownloadInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadInterceptor")
            .field("endpoint", self.dispatch.endpoint())
            .finish_non_exhaustive()
    }
}

/// Builds the redirect for a captured native download.
fn build_redirect(record: &DownloadRecord, url: &str) -> RedirectRequest {
    RedirectRequest {
        url: url.to_string(),
        referer: record.referrer.clone(),
        page_address: record.page_url.clone().or_else(|| record.referrer.clone()),
        description: record.filename.clone(),
        is_browser_native: true,
    }
}

/// Whether the external application can fetch this URL on its own.
///
/// Only plain web URLs qualify; data/blob/file/javascript and friends are
/// browser-internal and pass through. Unparseable URLs pass through too.
fn is_proxyable_scheme(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_proxyable_schemes() {
        assert!(is_proxyable_scheme("https://example.com/a.zip"));
        assert!(is_proxyable_scheme("http://example.com/a.zip"));
        assert!(!is_proxyable_scheme("data:text/plain;base64,aGk="));
        assert!(!is_proxyable_scheme("blob:https://example.com/uuid"));
        assert!(!is_proxyable_scheme("file:///tmp/a.zip"));
        assert!(!is_proxyable_scheme("javascript:void(0)"));
        assert!(!is_proxyable_scheme("not a url"));
    }

    #[test]
    fn test_build_redirect_is_browser_native() {
        let record = DownloadRecord {
            id: 9,
            url: "https://origin/file.zip".to_string(),
            referrer: Some("https://origin/page".to_string()),
            filename: Some("file.zip".to_string()),
            ..DownloadRecord::default()
        };
        let request = build_redirect(&record, record.effective_url());
        assert!(request.is_browser_native);
        assert_eq!(request.description.as_deref(), Some("file.zip"));
        assert_eq!(
            request.page_address.as_deref(),
            Some("https://origin/page"),
            "page address falls back to the referrer when the page url is unknown"
        );
    }
}
