//! Transport error conversions
//!
//! Everything reqwest can throw is lowered into the workspace taxonomy so
//! the resilience layer can classify it: timeouts become `Timeout`,
//! connection-level failures become `Network` (retryable), and HTTP error
//! statuses become `Api { status }` (retryable only for the transient
//! status set).

use std::time::Duration;

use prismflow_domain::PrismError;

/// Convert a reqwest error into the workspace taxonomy.
pub fn from_reqwest(operation: &str, timeout: Duration, err: reqwest::Error) -> PrismError {
    if err.is_timeout() {
        return PrismError::timeout(operation, timeout);
    }
    if let Some(status) = err.status() {
        return PrismError::api(status.as_u16(), err.to_string());
    }
    PrismError::network(err.to_string())
}

/// Convert an HTTP error status plus body into the workspace taxonomy.
pub fn from_status(status: u16, body: String) -> PrismError {
    let message = if body.is_empty() {
        "request failed".to_string()
    } else {
        body
    };
    PrismError::api(status, message)
}
