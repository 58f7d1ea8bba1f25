//! Domain-level constants
//!
//! Centralized location for constants shared by the resilience layer and the
//! orchestrator.

use std::time::Duration;

/// HTTP statuses treated as transient by default.
pub const RETRYABLE_HTTP_STATUSES: &[u16] = &[408, 429, 500, 502, 503, 504];

// Retry defaults
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

// Circuit breaker defaults
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MONITORING_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_HALF_OPEN_MAX_CALLS: u32 = 1;

// Offline queue defaults
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_000;
pub const DEFAULT_ACTION_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RESYNC_BASE_DELAY: Duration = Duration::from_secs(1);
/// Resync backoff never exceeds this, regardless of retry count.
pub const MAX_RESYNC_DELAY: Duration = Duration::from_secs(300);

// Polling defaults
pub const DEFAULT_POLL_INITIAL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_POLL_MAX_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_POLL_BUDGET: Duration = Duration::from_secs(600);
