//! Job lifecycle types shared across the workspace

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to a job by the external transformation service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a fresh local identifier (used for queued submissions that
    /// do not yet have a remote id).
    pub fn new_local() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Local job lifecycle state.
///
/// `Succeeded`, `Failed` and `Cancelled` are terminal: no further transition
/// occurs once one of them is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Submitted, not yet observed running
    Pending,
    /// The external service reports the job in progress
    Running,
    /// Terminal: completed successfully
    Succeeded,
    /// Terminal: failed remotely or exceeded the polling budget
    Failed,
    /// Terminal: cancelled by the caller
    Cancelled,
}

impl JobStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Check if a transition to `next` is valid.
    pub fn can_transition_to(self, next: Self) -> bool {
        use JobStatus::{Cancelled, Failed, Pending, Running, Succeeded};

        match (self, next) {
            (Pending, Running | Succeeded | Failed | Cancelled) => true,
            (Running, Succeeded | Failed | Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Status reported by the external service's status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemoteStatus {
    Queued,
    Running,
    Success,
    Failed,
}

impl RemoteStatus {
    /// Whether the remote job has finished (either way).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// A produced output of a completed transformation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub url: String,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
}

/// Request describing the transformation to run.
///
/// The wire encoding of this struct is owned by the infra layer; the domain
/// representation keeps native numeric types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Source image location understood by the external service
    pub source_url: String,
    /// Named transformation preset (e.g. "upscale", "restyle")
    pub transform: String,
    pub width: u32,
    pub height: u32,
    /// Transformation strength in [0.0, 1.0]
    pub strength: f64,
    /// Service region the job should run in
    pub region: String,
    pub seed: Option<u64>,
}

impl JobSpec {
    /// Validate user-supplied fields before anything touches the network.
    pub fn validate(&self) -> Result<(), crate::errors::PrismError> {
        if self.source_url.is_empty() {
            return Err(crate::errors::PrismError::validation(
                "source_url",
                "must not be empty",
            ));
        }
        if self.transform.is_empty() {
            return Err(crate::errors::PrismError::validation(
                "transform",
                "must not be empty",
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(crate::errors::PrismError::validation(
                "dimensions",
                "width and height must be non-zero",
            ));
        }
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(crate::errors::PrismError::validation(
                "strength",
                "must be within [0.0, 1.0]",
            ));
        }
        Ok(())
    }
}

/// A tracked transformation job.
///
/// Owned exclusively by the orchestrator; everything else sees cloned
/// snapshots or watch-channel projections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub last_polled_at: Option<DateTime<Utc>>,
    /// Number of status polls issued so far
    pub attempts: u32,
    pub results: Vec<Artifact>,
    pub region: String,
    /// Set when the job succeeded but the result fetch failed; the caller can
    /// retry the fetch without resubmitting.
    pub fetch_failed: bool,
}

impl Job {
    /// Create a freshly-submitted job in `Pending` state.
    pub fn new(id: JobId, region: String) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            submitted_at: Utc::now(),
            last_polled_at: None,
            attempts: 0,
            results: Vec::new(),
            region,
            fetch_failed: false,
        }
    }
}
