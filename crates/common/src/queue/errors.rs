//! Queue operation errors

use thiserror::Error;

use prismflow_domain::{ErrorClassification, ErrorSeverity, PrismError};

/// Errors raised by offline queue operations.
///
/// Queue-specific variants compose with the workspace error type; crossing
/// the crate boundary converts back into `PrismError` so callers deal with
/// one taxonomy.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Common(#[from] PrismError),

    #[error("Queue is at capacity ({0} actions)")]
    Full(usize),

    #[error("Action not found: {0}")]
    NotFound(String),

    #[error("Duplicate action id: {0}")]
    Duplicate(String),

    #[error("Queue is shutting down")]
    ShuttingDown,
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

impl From<QueueError> for PrismError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Common(inner) => inner,
            QueueError::Full(capacity) => PrismError::queue_full(capacity),
            QueueError::NotFound(id) => {
                PrismError::internal(format!("queue action not found: {id}"))
            }
            QueueError::Duplicate(id) => {
                PrismError::internal(format!("duplicate queue action: {id}"))
            }
            QueueError::ShuttingDown => PrismError::cancelled("offline queue sync"),
        }
    }
}

impl ErrorClassification for QueueError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Common(inner) => inner.is_retryable(),
            // The queue might have space after the next drain.
            Self::Full(_) => true,
            Self::NotFound(_) | Self::Duplicate(_) | Self::ShuttingDown => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Common(inner) => inner.severity(),
            Self::Full(_) | Self::Duplicate(_) => ErrorSeverity::Warning,
            Self::NotFound(_) | Self::ShuttingDown => ErrorSeverity::Info,
        }
    }
}
