//! Error types for the ahem-helper crate.
//!
//! All errors implement [`std::error::Error`] and provide context about what went wrong.
//! Transport failures are never retried by the crate itself; [`Error::is_retryable`]
//! tells callers which ones are worth retrying on their side.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the mail server or inspecting emails.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration / validation errors (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// A caller-supplied regular expression failed to compile.
    #[error("invalid pattern '{pattern}'")]
    InvalidPattern {
        /// The pattern that was rejected.
        pattern: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Transport errors (propagate immediately, never retried internally)
    // ─────────────────────────────────────────────────────────────────────────
    /// The HTTP request could not be sent or the response could not be read.
    #[error("request to {url} failed")]
    Request {
        /// The request URL.
        url: String,
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status.
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        /// The request URL.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The raw response body text.
        body: String,
    },

    /// The response body was not the JSON shape we expected.
    #[error("malformed JSON from {url}")]
    Decode {
        /// The request URL.
        url: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The token endpoint rejected the authentication request.
    #[error("authentication failed with HTTP {status}: {body}")]
    Auth {
        /// The HTTP status code.
        status: u16,
        /// The raw response body text.
        body: String,
    },

    /// The token endpoint answered 2xx but carried no token.
    #[error("no token returned from authentication")]
    MissingToken,

    // ─────────────────────────────────────────────────────────────────────────
    // Wait errors (NOT retryable - the full budget was already spent)
    // ─────────────────────────────────────────────────────────────────────────
    /// No email matched before the wait deadline.
    #[error("timed out after {timeout:?} waiting in '{mailbox}' for {criteria}")]
    WaitTimeout {
        /// The mailbox that was polled.
        mailbox: String,
        /// Human-readable description of the criteria.
        criteria: String,
        /// The configured timeout.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Extraction errors (NOT retryable - the snapshot won't change)
    // ─────────────────────────────────────────────────────────────────────────
    /// A derived extraction found nothing in the fetched email.
    #[error("no {what} found in email body")]
    NotFound {
        /// What was being looked for.
        what: String,
    },
}

impl Error {
    /// Returns `true` if this error represents a transient failure that might succeed on retry.
    ///
    /// The crate never retries on its own; this is for callers building their own policy.
    ///
    /// ```ignore
    /// if error.is_retryable() {
    ///     // Backoff and retry
    /// } else {
    ///     // Fail permanently
    /// }
    /// ```
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Request { .. } => true,
            Error::Status { status, .. } | Error::Auth { status, .. } => {
                *status >= 500 || *status == 429
            }

            Error::InvalidConfig { .. }
            | Error::InvalidPattern { .. }
            | Error::Decode { .. }
            | Error::MissingToken
            | Error::WaitTimeout { .. }
            | Error::NotFound { .. } => false,
        }
    }

    /// Returns `true` for failures that came from talking to the server.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transport | ErrorCategory::Decode
        )
    }

    /// Returns the HTTP status for errors that carry one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } | Error::Auth { status, .. } => Some(*status),
            Error::Request { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns the error category for metrics/logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidConfig { .. } | Error::InvalidPattern { .. } => {
                ErrorCategory::Configuration
            }

            Error::Request { .. }
            | Error::Status { .. }
            | Error::Auth { .. }
            | Error::MissingToken => ErrorCategory::Transport,

            Error::Decode { .. } => ErrorCategory::Decode,

            Error::WaitTimeout { .. } => ErrorCategory::Timeout,

            Error::NotFound { .. } => ErrorCategory::NotFound,
        }
    }
}

/// Error categories for metrics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration or validation errors.
    Configuration,
    /// Network failures and non-2xx responses.
    Transport,
    /// Malformed response bodies.
    Decode,
    /// Wait deadline exceeded.
    Timeout,
    /// Nothing to extract.
    NotFound,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Transport => write!(f, "transport"),
            ErrorCategory::Decode => write!(f, "decode"),
            ErrorCategory::Timeout => write!(f, "timeout"),
            ErrorCategory::NotFound => write!(f, "not_found"),
        }
    }
}
