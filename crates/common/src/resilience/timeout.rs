//! Deadline enforcement for individual operations
//!
//! `TimeoutExecutor` races an operation against a hard deadline. On expiry it
//! cancels the operation through a `CancellationToken` so in-flight network
//! calls can release their resources, and fails with `PrismError::Timeout`.
//! No retry logic lives here.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use prismflow_domain::{PrismError, Result};

/// Runs operations under a hard deadline.
#[derive(Debug, Clone)]
pub struct TimeoutExecutor {
    timeout: Duration,
}

impl TimeoutExecutor {
    /// Create an executor enforcing the given deadline on every run.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The configured deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `make_op` with the configured deadline.
    ///
    /// The operation receives a child `CancellationToken`; it must pass the
    /// token down to any awaited I/O so cancellation is observed promptly.
    /// On expiry the token is cancelled and the call fails with
    /// `PrismError::Timeout`.
    pub async fn run<F, Fut, T>(&self, operation_name: &str, make_op: F) -> Result<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = CancellationToken::new();
        let op = make_op(token.child_token());

        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_elapsed) => {
                warn!(
                    operation = operation_name,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "operation deadline exceeded, cancelling"
                );
                token.cancel();
                Err(PrismError::timeout(operation_name, self.timeout))
            }
        }
    }

    /// Execute with an external parent token in addition to the deadline.
    ///
    /// Used by the orchestrator so cancelling a job also cancels whatever
    /// call is currently in flight for it.
    pub async fn run_cancellable<F, Fut, T>(
        &self,
        operation_name: &str,
        parent: &CancellationToken,
        make_op: F,
    ) -> Result<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = parent.child_token();
        let op = make_op(token.clone());

        tokio::select! {
            outcome = tokio::time::timeout(self.timeout, op) => match outcome {
                Ok(result) => result,
                Err(_elapsed) => {
                    warn!(
                        operation = operation_name,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "operation deadline exceeded, cancelling"
                    );
                    token.cancel();
                    Err(PrismError::timeout(operation_name, self.timeout))
                }
            },
            () = parent.cancelled() => {
                debug!(operation = operation_name, "operation cancelled by caller");
                token.cancel();
                Err(PrismError::cancelled(operation_name))
            }
        }
    }
}
