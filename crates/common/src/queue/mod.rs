//! Durable offline action queue
//!
//! Actions that cannot complete online (device offline, circuit open) are
//! enqueued here and replayed when connectivity returns. The queue orders by
//! priority then age, honors dependencies between actions, expires stale
//! work, retries failures with capped exponential backoff, and persists its
//! contents so nothing is lost across process restarts.

mod core;
mod errors;
mod persistence;
mod types;

pub use self::core::{OfflineQueue, SyncHandler};
pub use self::errors::{QueueError, QueueResult};
pub use self::persistence::{PersistedQueueState, PersistenceService};
pub use self::types::{
    ActionKind, DropReason, OfflineAction, Priority, QueueConfig, QueueEvent, SyncFailure,
    SyncResult,
};
