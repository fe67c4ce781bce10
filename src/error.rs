//! Error types for the signed-request engine.

use thiserror::Error;

use crate::config::ConfigError;
use crate::ids::DecodeError;

/// Errors raised by the request executor, the task poller and the
/// identifier codec.
///
/// The variants form a closed set so callers can decide on retries by
/// matching on the kind rather than on message text.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum EcloudError {
    /// Raised when the request signature cannot be computed.
    #[error("signing failed: {message}")]
    Signing {
        /// Underlying cryptographic or encoding failure.
        message: String,
    },
    /// Raised when the API answers `403 Forbidden`.
    #[error("authorization rejected for {method} {path}: {body}")]
    Authorization {
        /// HTTP method of the rejected request.
        method: String,
        /// Normalized request path.
        path: String,
        /// Response body returned with the rejection.
        body: String,
    },
    /// Raised for a single `500`, `502` or `503` answer. The executor retries
    /// these and only surfaces [`EcloudError::Communication`] once the
    /// attempt ceiling is reached.
    #[error("transient server error {status} for {path}")]
    TransientServer {
        /// HTTP status code.
        status: u16,
        /// Normalized request path.
        path: String,
        /// Response body, if any.
        body: String,
    },
    /// Raised on network failures or when transient retries are exhausted.
    #[error("communication with the cloud API failed: {message}")]
    Communication {
        /// Description of the failure.
        message: String,
        /// Response body captured from the last attempt, if any.
        body: Option<String>,
    },
    /// Raised for any other non-success status.
    #[error("unexpected HTTP status {status} for {method} {path}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// HTTP method of the request.
        method: String,
        /// Normalized request path.
        path: String,
        /// Response body.
        body: String,
    },
    /// Raised when a response cannot be parsed or lacks an expected element.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Raised when an asynchronous task finishes in the `Error` state.
    #[error("task {task} failed: {message}")]
    TaskFailed {
        /// Task handle that reported the failure.
        task: String,
        /// Error message reported by the provider.
        message: String,
    },
    /// Raised when a task does not reach a terminal state in time.
    #[error("timeout after {waited_secs}s waiting for task {task}")]
    TimedOut {
        /// Task handle being waited on.
        task: String,
        /// Seconds elapsed when the wait was abandoned.
        waited_secs: u64,
    },
    /// Raised when too many consecutive polls fail.
    #[error("task status unavailable for {task} after {failures} failed polls: {last_error}")]
    TaskStatusUnavailable {
        /// Task handle being polled.
        task: String,
        /// Number of consecutive failed polls.
        failures: u32,
        /// Rendering of the last poll failure.
        last_error: String,
    },
    /// Raised when a composite identifier does not match its expected shape.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Raised when session configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EcloudError {
    /// Reports whether repeating the whole higher-level operation may succeed.
    ///
    /// Authorization, protocol, decode and task failures are definitive;
    /// communication problems and timeouts may clear on their own.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientServer { .. }
                | Self::Communication { .. }
                | Self::TimedOut { .. }
                | Self::TaskStatusUnavailable { .. }
        )
    }

    /// Reports whether a task poll that produced this error counts as a
    /// failed poll rather than a fatal one.
    pub(crate) const fn is_failed_poll(&self) -> bool {
        matches!(
            self,
            Self::TransientServer { .. } | Self::Communication { .. } | Self::Protocol(_)
        )
    }
}

impl From<ConfigError> for EcloudError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<quick_xml::Error> for EcloudError {
    fn from(value: quick_xml::Error) -> Self {
        Self::Protocol(format!("malformed XML: {value}"))
    }
}
