use std::time::Duration;

use rspotify::ClientError;
use rspotify::http::HttpError;
use rspotify::model::IdError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// How a failed remote call should be treated by the retrying callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The service asked us to slow down (HTTP 429).
    RateLimited,
    /// Network hiccups and server-side errors that may go away on their own.
    Transient,
    /// Anything a retry will not fix.
    Fatal,
}

/// Everything that can go wrong in a pipeline run.
#[derive(Error, Debug)]
pub enum Error {
    /// Failure reported by the Spotify client.
    #[error("Spotify error: {0}")]
    SpotifyError(#[from] ClientError),

    /// HTTP 429 from the service.
    #[error(
        "Rate limited by Spotify{}",
        .retry_after.map(|d| format!(", retry after {}s", d.as_secs())).unwrap_or_default()
    )]
    RateLimited {
        /// Value of the `Retry-After` header, when present.
        retry_after: Option<Duration>,
    },

    /// An id that is not a valid Spotify id.
    #[error("Invalid Spotify id: {0}")]
    InvalidId(#[from] IdError),

    /// Missing credentials or out-of-range settings.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Local file I/O.
    #[error("Storage error: {0}")]
    StorageError(#[from] std::io::Error),

    /// Unreadable snapshot line or table export failure.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The library walk gave up.
    #[error("Pagination error: {0}")]
    PaginationError(#[from] PaginationError),

    /// A table lacks the columns a chart needs.
    #[error("Chart error: {0}")]
    ChartError(String),
}

impl Error {
    /// Classify the error for retry decisions.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::RateLimited { .. } => FailureKind::RateLimited,
            Error::SpotifyError(err) => classify_client_error(err),
            _ => FailureKind::Fatal,
        }
    }

    /// Wait the service asked for, if it said so.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

fn classify_client_error(err: &ClientError) -> FailureKind {
    match err {
        ClientError::Http(http) => match http.as_ref() {
            HttpError::StatusCode(response) => match response.status().as_u16() {
                429 => FailureKind::RateLimited,
                500..=599 => FailureKind::Transient,
                _ => FailureKind::Fatal,
            },
            HttpError::Client(inner) if inner.is_timeout() || inner.is_connect() => {
                FailureKind::Transient
            }
            HttpError::Client(_) => FailureKind::Fatal,
        },
        ClientError::Io(_) => FailureKind::Transient,
        _ => FailureKind::Fatal,
    }
}

/// Failure of a whole library walk.
#[derive(Error, Debug)]
pub enum PaginationError {
    /// Too many consecutive retryable failures on one page, or a
    /// `Retry-After` longer than the policy allows.
    #[error("gave up on page at offset {offset} after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Offset of the page that failed.
        offset: u32,
        /// Failed requests for that page.
        attempts: u32,
        /// Last failure.
        #[source]
        source: Box<Error>,
    },

    /// A failure no retry will fix.
    #[error("page at offset {offset} failed: {source}")]
    Fatal {
        /// Offset of the page that failed.
        offset: u32,
        /// The failure.
        #[source]
        source: Box<Error>,
    },
}
