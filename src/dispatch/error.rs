//! Error types for dispatch calls to the external application.

use thiserror::Error;

/// Failures talking to the external application's local API.
///
/// Callers collapse both variants into "treat as failure, do not retry
/// automatically"; the split exists for logging and for hosts that want to
/// tell "not running" apart from "running but declined".
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The external application is not running: connection refused, reset,
    /// or the loopback call timed out.
    #[error("external application unreachable at {url}: {source}")]
    Unreachable {
        /// The endpoint URL that could not be reached.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The application answered but declined the request: non-2xx status,
    /// a success flag set to false, or a body that failed to parse.
    #[error("external application rejected request to {url} (HTTP {status}): {message}")]
    Rejected {
        /// The endpoint URL that rejected the request.
        url: String,
        /// HTTP status of the response (0 when the body was unreadable).
        status: u16,
        /// Application-provided or derived failure message.
        message: String,
    },
}

impl DispatchError {
    /// Classifies a transport-level reqwest error.
    ///
    /// Timeouts and connect failures both mean "application not running" for
    /// a loopback endpoint.
    pub fn from_transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Unreachable {
            url: url.into(),
            source,
        }
    }

    /// Creates a rejection with the given status and message.
    pub fn rejected(url: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    /// Whether the failure means the application is not running at all.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

// No `From<reqwest::Error>` impl: every variant needs the endpoint URL for
// context, which the source error does not carry. Constructors keep callers
// honest about providing it.
