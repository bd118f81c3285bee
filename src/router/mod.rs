//! Message entry point for redirects that do not come from the browser's
//! native download pipeline.
//!
//! Page scripts and UI surfaces ask for a media URL to be redirected with a
//! small JSON message. These requests bypass the interceptor entirely: there
//! is no native download to cancel and, on failure, no safe fallback target —
//! the source page cannot be assumed downloadable through the browser's own
//! pipeline, so failure is reported, not reopened.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::dispatch::{DispatchClient, RedirectRequest};

/// Message kind asking for a media URL to be redirected.
pub const DOWNLOAD_MEDIA: &str = "download_media";

/// Acknowledgment returned for every message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    /// Whether the message was recognized and its redirect accepted.
    pub is_successful: bool,
    /// Human-readable detail, always present.
    pub message: String,
}

impl MessageResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            is_successful: true,
            message: message.into(),
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            is_successful: false,
            message: message.into(),
        }
    }
}

/// Routes inbound messages to the dispatch client.
pub struct MessageRouter {
    dispatch: Arc<DispatchClient>,
}

impl MessageRouter {
    #[must_use]
    pub fn new(dispatch: Arc<DispatchClient>) -> Self {
        Self { dispatch }
    }

    /// Handles one raw message, returning a structured acknowledgment.
    ///
    /// Unrecognized or malformed messages are rejected with a reason, never
    /// dropped silently.
    #[instrument(skip(self, message))]
    pub async fn handle(&self, message: &Value) -> MessageResponse {
        let Some(kind) = message.get("type").and_then(Value::as_str) else {
            return MessageResponse::rejected("message has no type field");
        };

        match kind {
            DOWNLOAD_MEDIA => self.handle_download_media(message).await,
            other => {
                debug!(kind = other, "unrecognized message type");
                MessageResponse::rejected(format!("unrecognized message type: {other}"))
            }
        }
    }

    async fn handle_download_media(&self, message: &Value) -> MessageResponse {
        let url = message
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if url.is_empty() {
            return MessageResponse::rejected("download_media requires a non-empty url");
        }

        let request = RedirectRequest::from_page(url);
        match self.dispatch.send(&[request]).await {
            Ok(ack) => MessageResponse::ok(
                ack.message
                    .unwrap_or_else(|| "redirect accepted".to_string()),
            ),
            Err(e) => {
                warn!(url, error = %e, "media redirect failed");
                MessageResponse::rejected(e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("endpoint", self.dispatch.endpoint())
            .finish()
    }
}
