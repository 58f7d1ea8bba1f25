//! Error types used throughout the application
//!
//! `PrismError` is the single error currency of the workspace. Module-level
//! errors (queue, infra) compose with it via `#[from]` rather than inventing
//! parallel taxonomies.
//!
//! Every error carries a classification (`ErrorClassification`) that the
//! retry layer and circuit breaker consult: retryable errors are absorbed by
//! retries until exhaustion and count toward breaker thresholds;
//! non-retryable errors propagate immediately and leave circuit health
//! untouched.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::constants::RETRYABLE_HTTP_STATUSES;

/// Main error type for PrismFlow
///
/// `Clone` is part of the contract: coalesced (single-flight) callers all
/// receive the same failure.
#[derive(Debug, Clone, Error)]
pub enum PrismError {
    /// An operation exceeded its deadline
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    /// Transport-level failure (DNS, connect, reset, offline)
    #[error("Network error: {message}")]
    Network { message: String },

    /// The external service answered with a non-success status
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Caller-supplied input was rejected before any network I/O
    #[error("Validation error for '{field}': {message}")]
    Validation { field: String, message: String },

    /// The circuit breaker for a dependency is open
    #[error("Circuit breaker open for '{service}'")]
    CircuitOpen {
        service: String,
        retry_after: Option<Duration>,
    },

    /// All retry attempts were exhausted; carries the final failure
    #[error("All {attempts} attempts exhausted")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<PrismError>,
    },

    /// The offline queue refused an action at capacity
    #[error("Offline queue full ({capacity} actions)")]
    QueueFull { capacity: usize },

    /// The operation was cancelled before completion
    #[error("Operation '{operation}' cancelled")]
    Cancelled { operation: String },

    /// Serialization or deserialization failure
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Local persistence failure (queue snapshot, offline data)
    #[error(
        "Persistence error{op}: {message}",
        op = .operation.as_ref().map(|o| format!(" during '{o}'")).unwrap_or_default()
    )]
    Persistence {
        message: String,
        operation: Option<String>,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Lock acquisition failure (poisoned mutex)
    #[error("Lock error: {message}")]
    Lock { message: String },

    /// Invariant violation; should not occur in normal operation
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Result type alias for PrismFlow operations
pub type Result<T> = std::result::Result<T, PrismError>;

impl PrismError {
    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn api<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn circuit_open<S: Into<String>>(service: S) -> Self {
        Self::CircuitOpen {
            service: service.into(),
            retry_after: None,
        }
    }

    pub fn circuit_open_with_retry<S: Into<String>>(service: S, retry_after: Duration) -> Self {
        Self::CircuitOpen {
            service: service.into(),
            retry_after: Some(retry_after),
        }
    }

    pub fn retries_exhausted(attempts: u32, source: PrismError) -> Self {
        Self::RetriesExhausted {
            attempts,
            source: Box::new(source),
        }
    }

    pub fn queue_full(capacity: usize) -> Self {
        Self::QueueFull { capacity }
    }

    pub fn cancelled<S: Into<String>>(operation: S) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence {
            message: message.into(),
            operation: None,
        }
    }

    pub fn persistence_op<O: Into<String>, S: Into<String>>(operation: O, message: S) -> Self {
        Self::Persistence {
            message: message.into(),
            operation: Some(operation.into()),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn lock<S: Into<String>>(message: S) -> Self {
        Self::Lock {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The last underlying failure, unwrapping retry exhaustion.
    pub fn root_failure(&self) -> &PrismError {
        match self {
            Self::RetriesExhausted { source, .. } => source.root_failure(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for PrismError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for PrismError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence(err.to_string())
    }
}

/// Unified severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Standard interface for classifying errors by their characteristics.
///
/// The retry layer uses `is_retryable` to decide whether to keep going; the
/// circuit breaker uses it to decide whether a failure counts toward the
/// failure threshold.
pub trait ErrorClassification {
    /// Can the failed operation be retried?
    fn is_retryable(&self) -> bool;

    /// How serious is this error?
    fn severity(&self) -> ErrorSeverity;

    /// Does this require immediate attention?
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Suggested delay before retrying, if the error carries one.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl ErrorClassification for PrismError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } | Self::Lock { .. } => true,
            Self::Api { status, .. } => RETRYABLE_HTTP_STATUSES.contains(status),
            // The breaker already decided the dependency is down; retrying
            // through it would defeat the fail-fast contract.
            Self::CircuitOpen { .. } => false,
            Self::Validation { .. }
            | Self::RetriesExhausted { .. }
            | Self::QueueFull { .. }
            | Self::Cancelled { .. }
            | Self::Serialization { .. }
            | Self::Persistence { .. }
            | Self::Config { .. }
            | Self::Internal { .. } => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. }
            | Self::Network { .. }
            | Self::CircuitOpen { .. }
            | Self::QueueFull { .. }
            | Self::Lock { .. } => ErrorSeverity::Warning,
            Self::Api { .. }
            | Self::Validation { .. }
            | Self::RetriesExhausted { .. }
            | Self::Serialization { .. }
            | Self::Persistence { .. }
            | Self::Config { .. } => ErrorSeverity::Error,
            Self::Cancelled { .. } => ErrorSeverity::Info,
            Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the error taxonomy and its classification.

    use super::*;

    /// Validates retryability across the taxonomy.
    ///
    /// Assertions:
    /// - Network and timeout errors are retryable.
    /// - Validation errors are never retryable.
    /// - API errors are retryable exactly for the transient status set.
    #[test]
    fn test_retryability_classification() {
        assert!(PrismError::network("connection reset").is_retryable());
        assert!(PrismError::timeout("submit", Duration::from_secs(5)).is_retryable());
        assert!(!PrismError::validation("width", "must be non-zero").is_retryable());

        for status in [408u16, 429, 500, 502, 503, 504] {
            assert!(
                PrismError::api(status, "transient").is_retryable(),
                "status {status} should be retryable"
            );
        }
        for status in [400u16, 401, 403, 404, 422] {
            assert!(
                !PrismError::api(status, "permanent").is_retryable(),
                "status {status} should not be retryable"
            );
        }
    }

    /// Validates that circuit-open errors fail fast at the retry layer.
    #[test]
    fn test_circuit_open_not_retryable() {
        let err = PrismError::circuit_open("external-ai-api");
        assert!(!err.is_retryable());
        assert!(err.retry_after().is_none());

        let err =
            PrismError::circuit_open_with_retry("external-ai-api", Duration::from_secs(30));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    }

    /// Validates `root_failure` unwraps nested retry exhaustion.
    #[test]
    fn test_root_failure_unwraps_exhaustion() {
        let inner = PrismError::api(503, "unavailable");
        let outer = PrismError::retries_exhausted(3, inner);

        match outer.root_failure() {
            PrismError::Api { status, .. } => assert_eq!(*status, 503),
            other => panic!("expected Api root failure, got {other:?}"),
        }
    }

    /// Validates severity mapping for representative variants.
    #[test]
    fn test_severity_levels() {
        assert_eq!(
            PrismError::network("offline").severity(),
            ErrorSeverity::Warning
        );
        assert_eq!(
            PrismError::validation("field", "bad").severity(),
            ErrorSeverity::Error
        );
        assert_eq!(
            PrismError::internal("broken invariant").severity(),
            ErrorSeverity::Critical
        );
        assert!(PrismError::internal("broken invariant").is_critical());
        assert_eq!(
            PrismError::cancelled("poll").severity(),
            ErrorSeverity::Info
        );
    }

    /// Validates display formatting carries the useful context.
    #[test]
    fn test_error_display() {
        let err = PrismError::api(429, "rate limited");
        assert!(err.to_string().contains("429"));

        let err = PrismError::timeout("poll", Duration::from_secs(10));
        assert!(err.to_string().contains("poll"));

        let err = PrismError::persistence_op("queue_save", "disk full");
        assert!(err.to_string().contains("queue_save"));

        let err = PrismError::queue_full(100);
        assert!(err.to_string().contains("100"));
    }
}
