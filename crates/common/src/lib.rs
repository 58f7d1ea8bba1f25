//! Resilience primitives and the offline action queue for PrismFlow.
//!
//! This crate provides the building blocks the orchestrator composes around
//! every call to the external transformation service:
//! - `resilience`: deadline enforcement, retry with backoff, circuit breaking
//!   with fallback strategies, and a named breaker registry
//! - `queue`: a durable, priority-ordered offline action queue with
//!   dependency ordering and exponential-backoff resync

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod queue;
pub mod resilience;

// Re-export commonly used types for convenience
pub use queue::{
    ActionKind, DropReason, OfflineAction, OfflineQueue, Priority, QueueConfig, QueueError,
    QueueEvent, SyncHandler, SyncResult,
};
pub use resilience::circuit_breaker::{
    CallOutcome, CircuitBreaker, CircuitBreakerConfig, CircuitState, FallbackPlan, ResponseCache,
};
pub use resilience::clock::{Clock, MockClock, SystemClock};
pub use resilience::random::{FixedRandom, RandomSource, ThreadRandom};
pub use resilience::registry::BreakerRegistry;
pub use resilience::retry::{BackoffKind, OperationKind, RetryConfig, RetryExecutor, RetryProfiles};
pub use resilience::timeout::TimeoutExecutor;
