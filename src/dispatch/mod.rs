//! Client for the external application's local dispatch API.
//!
//! Two calls exist: `POST /add` hands over an ordered batch of redirect
//! requests, `GET /filetypes` fetches the extension catalog the application
//! is willing to handle. Both target a fixed loopback endpoint with short
//! timeouts; a slow answer is treated the same as no answer.

mod error;

pub use error::DispatchError;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::BridgeConfig;

/// One redirect handed to the external application.
///
/// `is_browser_native` records whether the browser itself attempted this
/// download. Native downloads get reopened in a browser tab when dispatch
/// fails; page-requested ones have no safe fallback target and are only
/// reported as failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectRequest {
    /// The URL the application should fetch.
    pub url: String,
    /// Referrer header value to replay, when known.
    pub referer: Option<String>,
    /// Address of the page the download originated from, when known.
    pub page_address: Option<String>,
    /// Human-readable label, usually the suggested filename.
    pub description: Option<String>,
    /// Whether the browser's native download pipeline produced this request.
    pub is_browser_native: bool,
}

impl RedirectRequest {
    /// Builds a request for a URL a page script asked to redirect.
    #[must_use]
    pub fn from_page(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referer: None,
            page_address: None,
            description: None,
            is_browser_native: false,
        }
    }
}

/// Acknowledgment for an accepted batch.
#[derive(Debug, Clone, Default)]
pub struct DispatchAck {
    /// Message supplied by the application, when any.
    pub message: Option<String>,
}

/// Response envelope used by every endpoint of the local API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEnvelope {
    is_successful: bool,
    #[serde(default)]
    data: Option<Vec<String>>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the external application's local API.
///
/// Built once and shared; the underlying reqwest client pools its single
/// loopback connection.
#[derive(Debug, Clone)]
pub struct DispatchClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl DispatchClient {
    /// Creates a client for the endpoint and timeouts in `config`.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    /// This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(config: &BridgeConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            client,
            endpoint: config.endpoint.clone(),
        }
    }

    /// The endpoint this client targets.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Hands an ordered batch of redirect requests to the application.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Unreachable`] when the application is not running,
    /// [`DispatchError::Rejected`] when it answers but declines.
    #[instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn send(&self, requests: &[RedirectRequest]) -> Result<DispatchAck, DispatchError> {
        let url = self.route("add");
        debug!(url = %url, "dispatching redirect batch");

        let response = self
            .client
            .post(url.clone())
            .json(requests)
            .send()
            .await
            .map_err(|e| DispatchError::from_transport(url.as_str(), e))?;

        let envelope = Self::read_envelope(&url, response).await?;
        debug!(message = ?envelope.message, "redirect batch accepted");
        Ok(DispatchAck {
            message: envelope.message,
        })
    }

    /// Fetches the extension catalog the application is willing to handle.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`send`](Self::send).
    #[instrument(skip(self))]
    pub async fn fetch_supported_types(&self) -> Result<Vec<String>, DispatchError> {
        let url = self.route("filetypes");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DispatchError::from_transport(url.as_str(), e))?;

        let envelope = Self::read_envelope(&url, response).await?;
        let types = envelope.data.unwrap_or_default();
        debug!(count = types.len(), "fetched supported type catalog");
        Ok(types)
    }

    fn route(&self, path: &str) -> Url {
        let mut url = self.endpoint.clone();
        // A fixed loopback base always has a path to replace.
        url.set_path(path);
        url
    }

    /// Validates status and success flag, surfacing everything else as a
    /// rejection.
    async fn read_envelope(
        url: &Url,
        response: reqwest::Response,
    ) -> Result<ApiEnvelope, DispatchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::rejected(
                url.as_str(),
                status.as_u16(),
                format!("unexpected HTTP status {status}"),
            ));
        }

        let envelope: ApiEnvelope = response.json().await.map_err(|e| {
            warn!(url = %url, error = %e, "malformed response body from external application");
            DispatchError::rejected(url.as_str(), status.as_u16(), "malformed response body")
        })?;

        if !envelope.is_successful {
            let message = envelope
                .message
                .unwrap_or_else(|| "application reported failure".to_string());
            return Err(DispatchError::rejected(
                url.as_str(),
                status.as_u16(),
                message,
            ));
        }

        Ok(envelope)
    }
}
