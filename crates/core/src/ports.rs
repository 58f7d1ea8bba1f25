//! Port interfaces for the external transformation service
//!
//! The orchestrator never talks HTTP directly; it consumes the external
//! AI service through these traits so tests can script responses and the
//! transport can evolve independently.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use prismflow_domain::{Artifact, JobId, JobSpec, RemoteStatus, Result};

/// The external image-transformation service.
///
/// Every call that performs network I/O accepts a cancellation token and
/// must observe it promptly so timeouts and job cancellation do not leak
/// in-flight requests.
#[async_trait]
pub trait TransformService: Send + Sync {
    /// Submit a job; returns the service-assigned job id.
    async fn submit(&self, spec: &JobSpec, cancel: &CancellationToken) -> Result<JobId>;

    /// Fetch the current status of a job.
    async fn status(&self, id: &JobId, cancel: &CancellationToken) -> Result<RemoteStatus>;

    /// Fetch the artifacts of a completed job.
    async fn result(&self, id: &JobId, cancel: &CancellationToken) -> Result<Vec<Artifact>>;

    /// Best-effort remote cancellation; callers never block on this
    /// succeeding.
    async fn cancel(&self, id: &JobId) -> Result<()>;
}

/// Reports whether the device currently has connectivity.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}
