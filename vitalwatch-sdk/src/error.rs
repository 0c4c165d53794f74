//! Error types for the monitoring engine.

use thiserror::Error;
use vitalwatch_types::{MetricKind, MonitorKey};

/// Errors that can occur when talking to a measurement source.
///
/// Every variant means the source could not be reached or understood. Inside
/// a scheduled tick these are logged per observation and never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The requested resource does not exist on the source.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl SourceError {
    /// Whether retrying on a later tick could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::Connection(_) | SourceError::Timeout | SourceError::Http(_)
        )
    }
}

/// Errors returned by monitor tasks and the dispatcher.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The measurement source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The source answered but held no reading for this observation.
    #[error("no reading available for {0}")]
    NoReading(MonitorKey),

    /// The key is not present in the store.
    #[error("{0} is not tracked")]
    NotTracked(MonitorKey),

    /// No task is registered for this metric kind.
    #[error("no monitor task registered for {0}")]
    UnknownKind(MetricKind),

    /// A required collaborator was not supplied to the builder.
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    /// The dispatcher was built outside a tokio runtime.
    #[error("no tokio runtime available to run scheduled updates")]
    NoRuntime,
}
