//! Error types for adapters.

use thiserror::Error;

#[cfg(feature = "fhir")]
use vitalwatch_sdk::SourceError;

/// Errors raised while constructing an adapter.
///
/// Errors raised while talking to the remote service are reported as
/// [`SourceError`](vitalwatch_sdk::SourceError).
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    /// The configured endpoint is not an absolute http(s) URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

#[cfg(feature = "fhir")]
pub(crate) fn source_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout
    } else if err.is_connect() {
        SourceError::Connection(err.to_string())
    } else if err.is_decode() {
        SourceError::Parse(err.to_string())
    } else {
        SourceError::Http(err.to_string())
    }
}
