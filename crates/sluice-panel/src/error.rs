//! Error types for panel operations.

use thiserror::Error;

/// Fallback shown when the backend could not be reached at all.
pub const TRANSPORT_FALLBACK_MESSAGE: &str = "Unable to reach the download server";

/// Fallback shown when the backend answered with something unreadable.
pub const MALFORMED_FALLBACK_MESSAGE: &str = "The download server returned an unexpected response";

/// Failure raised by an [`HttpTransport`](crate::transport::HttpTransport) before any
/// HTTP status was received (connection refused, timeout, DNS, ...).
#[derive(Debug, Error)]
#[error("transport failure: {message}")]
pub struct TransportError {
    /// Human-readable detail from the underlying client.
    pub message: String,
}

impl TransportError {
    /// Wrap a transport-level failure description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Primary error type for backend calls issued by the panel.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("request to {path} failed")]
    Transport {
        /// Endpoint path of the failed request.
        path: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },
    /// The backend rejected the request.
    #[error("request to {path} was rejected: {message}")]
    Application {
        /// Endpoint path of the rejected request.
        path: String,
        /// HTTP status code returned.
        status: u16,
        /// Error text extracted from the response body.
        message: String,
    },
    /// The backend answered with a body that could not be decoded.
    #[error("response from {path} could not be decoded")]
    Malformed {
        /// Endpoint path of the request.
        path: String,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Message suitable for a user-facing notification.
    ///
    /// Application errors surface the backend text verbatim; the other kinds fall back to a
    /// generic message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport { .. } => TRANSPORT_FALLBACK_MESSAGE.to_string(),
            Self::Application { message, .. } => message.clone(),
            Self::Malformed { .. } => MALFORMED_FALLBACK_MESSAGE.to_string(),
        }
    }

    /// `true` when the failure happened before any response arrived.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Endpoint path the failure relates to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Transport { path, .. }
            | Self::Application { path, .. }
            | Self::Malformed { path, .. } => path,
        }
    }
}

/// Convenience alias for backend call results.
pub type ApiResult<T> = Result<T, ApiError>;
