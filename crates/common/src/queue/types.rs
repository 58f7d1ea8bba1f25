//! Offline queue data types

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use prismflow_domain::constants::{
    DEFAULT_ACTION_MAX_RETRIES, DEFAULT_QUEUE_CAPACITY, DEFAULT_RESYNC_BASE_DELAY,
    MAX_RESYNC_DELAY,
};
use prismflow_domain::{PrismError, Result};

/// Action priority levels; lower value drains first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Critical = 0,
    High = 1,
    Normal = 2,
    Low = 3,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "Critical"),
            Self::High => write!(f, "High"),
            Self::Normal => write!(f, "Normal"),
            Self::Low => write!(f, "Low"),
        }
    }
}

/// What kind of deferred work an action represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SubmitJob,
    UploadAsset,
    SaveDraft,
    CancelJob,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubmitJob => write!(f, "submit_job"),
            Self::UploadAsset => write!(f, "upload_asset"),
            Self::SaveDraft => write!(f, "save_draft"),
            Self::CancelJob => write!(f, "cancel_job"),
        }
    }
}

/// A deferred action awaiting sync.
///
/// Timestamps are milliseconds since the Unix epoch so persisted state stays
/// meaningful across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineAction {
    pub id: String,
    pub kind: ActionKind,
    pub payload: serde_json::Value,
    pub priority: Priority,
    pub created_at: u64,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Earliest epoch-millis the action may next be attempted
    pub next_retry_at: Option<u64>,
    /// Action ids that must be drained before this one is eligible
    pub depends_on: Vec<String>,
    /// Epoch-millis past which the action is dropped without an attempt
    pub expires_at: Option<u64>,
    pub last_error: Option<String>,
}

impl OfflineAction {
    /// Create a new action with the given payload and priority.
    pub fn new(kind: ActionKind, payload: serde_json::Value, priority: Priority, now: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            payload,
            priority,
            created_at: now,
            retry_count: 0,
            max_retries: DEFAULT_ACTION_MAX_RETRIES,
            next_retry_at: None,
            depends_on: Vec::new(),
            expires_at: None,
            last_error: None,
        }
    }

    /// Set maximum sync attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Require other actions to drain first.
    pub fn with_dependencies(mut self, depends_on: Vec<String>) -> Self {
        self.depends_on = depends_on;
        self
    }

    /// Drop the action without attempting sync past this epoch-millis time.
    pub fn with_expiry(mut self, expires_at: u64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the action may still be retried after a failure.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Whether the action has expired at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether the action's backoff schedule allows an attempt at `now`.
    pub fn is_due(&self, now: u64) -> bool {
        self.next_retry_at.map_or(true, |at| at <= now)
    }

    /// Compute the next attempt time after a failure.
    ///
    /// Exponential in the retry count, capped at five minutes. This schedule
    /// is independent of the per-call retry backoff used while online.
    pub fn schedule_retry(&mut self, base_delay: Duration, now: u64) {
        let base_ms = base_delay.as_millis().max(1) as u64;
        let exponent = self.retry_count.min(16);
        let backoff = base_ms.saturating_mul(1_u64 << exponent);
        let capped = backoff.min(MAX_RESYNC_DELAY.as_millis() as u64);
        self.next_retry_at = Some(now.saturating_add(capped));
    }

    /// Record a failed attempt.
    pub fn mark_failed(&mut self, error: String) {
        self.retry_count += 1;
        self.last_error = Some(error);
    }
}

/// Why an action left the queue without syncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    Expired,
    RetriesExhausted,
    Cancelled,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "expired"),
            Self::RetriesExhausted => write!(f, "retries exhausted"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One failed action within a sync pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFailure {
    pub action_id: String,
    pub kind: ActionKind,
    pub message: String,
    /// True when the action was removed from the queue for good
    pub dropped: bool,
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncResult {
    /// Actions synced successfully and removed
    pub processed: usize,
    /// Actions that failed this pass (rescheduled or dropped)
    pub failed: usize,
    /// Details for every failure; dropped actions always appear here
    pub errors: Vec<SyncFailure>,
}

/// Events observers can subscribe to.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    ActionEnqueued { id: String, kind: ActionKind },
    ActionDropped { id: String, reason: DropReason },
    ConnectivityChanged { online: bool },
    SyncStarted,
    SyncCompleted(SyncResult),
}

/// Queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of queued actions
    pub capacity: usize,
    /// Base delay for the resync backoff schedule
    pub base_retry_delay: Duration,
    /// Interval of the periodic drain timer
    pub drain_interval: Duration,
    /// Snapshot location; `None` disables persistence
    pub persistence_path: Option<PathBuf>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            base_retry_delay: DEFAULT_RESYNC_BASE_DELAY,
            drain_interval: Duration::from_secs(30),
            persistence_path: None,
        }
    }
}

impl QueueConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(PrismError::config("queue capacity must be at least 1"));
        }
        if self.base_retry_delay.is_zero() {
            return Err(PrismError::config(
                "base_retry_delay must be greater than zero",
            ));
        }
        if self.drain_interval.is_zero() {
            return Err(PrismError::config(
                "drain_interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Snapshot of the offline key/value store persisted next to the actions.
pub type OfflineData = HashMap<String, serde_json::Value>;
