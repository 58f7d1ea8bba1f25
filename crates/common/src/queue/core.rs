//! Offline queue implementation
//!
//! ## Ordering
//!
//! A sync pass selects actions one at a time: highest priority first, oldest
//! first within a tier, skipping actions whose backoff schedule is not due,
//! whose dependencies are still queued, or which have expired. Because a
//! successful sync removes the action, dependents become eligible later in
//! the same pass.
//!
//! ## Durability
//!
//! Every mutating operation persists a fresh snapshot before returning, so a
//! crash or reload while offline loses nothing. Snapshots carry the pending
//! actions, the offline key/value store, and the last-sync timestamp.
//!
//! ## Concurrency
//!
//! Queue state lives behind one mutex that is never held across an await;
//! sync passes are serialized by an async gate so two callers cannot drain
//! the same actions concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::errors::{QueueError, QueueResult};
use super::persistence::{PersistedQueueState, PersistenceService};
use super::types::{
    DropReason, OfflineAction, OfflineData, QueueConfig, QueueEvent, SyncFailure, SyncResult,
};
use crate::resilience::clock::{Clock, SystemClock};

/// Applies a queued action against the outside world during sync.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    /// Perform the action. An `Ok` removes it from the queue; an `Err`
    /// reschedules or drops it depending on its retry budget.
    async fn apply(&self, action: &OfflineAction) -> prismflow_domain::Result<()>;
}

#[derive(Debug, Default)]
struct QueueState {
    actions: HashMap<String, OfflineAction>,
    offline_data: OfflineData,
    last_sync_at: Option<u64>,
}

/// Durable, priority-ordered queue of deferred actions.
pub struct OfflineQueue {
    config: QueueConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
    events: broadcast::Sender<QueueEvent>,
    notify: Notify,
    online: AtomicBool,
    shutdown: AtomicBool,
    /// Serializes sync passes; held across handler awaits.
    sync_gate: tokio::sync::Mutex<()>,
    persistence: Option<PersistenceService>,
}

impl OfflineQueue {
    /// Create a queue and load any persisted snapshot.
    pub async fn open(config: QueueConfig) -> QueueResult<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Create a queue with a custom clock (useful for testing).
    pub async fn open_with_clock(
        config: QueueConfig,
        clock: Arc<dyn Clock>,
    ) -> QueueResult<Self> {
        config.validate().map_err(QueueError::Common)?;

        let persistence = config
            .persistence_path
            .clone()
            .map(PersistenceService::new);

        let (events, _) = broadcast::channel(64);

        let queue = Self {
            config,
            clock,
            state: Mutex::new(QueueState::default()),
            events,
            notify: Notify::new(),
            online: AtomicBool::new(true),
            shutdown: AtomicBool::new(false),
            sync_gate: tokio::sync::Mutex::new(()),
            persistence,
        };

        if let Some(service) = &queue.persistence {
            if let Some(snapshot) = service.load().await? {
                let mut state = queue.lock_state();
                for action in snapshot.actions {
                    state.actions.insert(action.id.clone(), action);
                }
                state.offline_data = snapshot.offline_data;
                state.last_sync_at = snapshot.last_sync_at;
                info!(actions = state.actions.len(), "offline queue restored");
            }
        }

        Ok(queue)
    }

    /// Enqueue a deferred action.
    #[instrument(skip(self, action), fields(action_id = %action.id, kind = %action.kind, priority = %action.priority))]
    pub async fn enqueue(&self, action: OfflineAction) -> QueueResult<()> {
        if self.shutdown.load(AtomicOrdering::Relaxed) {
            return Err(QueueError::ShuttingDown);
        }

        let event = {
            let mut state = self.lock_state();

            if state.actions.len() >= self.config.capacity {
                return Err(QueueError::Full(self.config.capacity));
            }
            if state.actions.contains_key(&action.id) {
                return Err(QueueError::Duplicate(action.id.clone()));
            }

            let event = QueueEvent::ActionEnqueued {
                id: action.id.clone(),
                kind: action.kind,
            };
            state.actions.insert(action.id.clone(), action);
            event
        };

        self.persist().await?;
        let _ = self.events.send(event);
        self.notify.notify_one();

        debug!("action enqueued");
        Ok(())
    }

    /// Cancel a queued action.
    pub async fn cancel(&self, id: &str) -> QueueResult<()> {
        {
            let mut state = self.lock_state();
            if state.actions.remove(id).is_none() {
                return Err(QueueError::NotFound(id.to_string()));
            }
        }

        self.persist().await?;
        let _ = self.events.send(QueueEvent::ActionDropped {
            id: id.to_string(),
            reason: DropReason::Cancelled,
        });
        Ok(())
    }

    /// Run one sync pass with the given handler.
    ///
    /// Eligible actions are attempted strictly one at a time. Failures count
    /// in `SyncResult.failed` and appear in `SyncResult.errors`; an action
    /// that exhausts `max_retries` is dropped for good with `dropped: true`.
    /// Expired actions are dropped without an attempt and reported in
    /// `errors` (but not counted as failed attempts).
    #[instrument(skip(self, handler))]
    pub async fn sync(&self, handler: &dyn SyncHandler) -> QueueResult<SyncResult> {
        if self.shutdown.load(AtomicOrdering::Relaxed) {
            return Err(QueueError::ShuttingDown);
        }

        let _gate = self.sync_gate.lock().await;
        let _ = self.events.send(QueueEvent::SyncStarted);

        let mut result = SyncResult::default();

        loop {
            let now = self.clock.epoch_millis();
            let (candidate, dropped) = {
                let mut state = self.lock_state();
                let dropped = Self::sweep_expired(&mut state, now, &mut result);
                (Self::select_next(&state, now), dropped)
            };
            for id in dropped {
                let _ = self.events.send(QueueEvent::ActionDropped {
                    id,
                    reason: DropReason::Expired,
                });
            }

            let Some(action) = candidate else { break };

            debug!(
                action_id = %action.id,
                kind = %action.kind,
                attempt = action.retry_count + 1,
                "syncing action"
            );

            match handler.apply(&action).await {
                Ok(()) => {
                    let mut state = self.lock_state();
                    state.actions.remove(&action.id);
                    result.processed += 1;
                }
                Err(error) => {
                    result.failed += 1;
                    let dropped = {
                        let mut state = self.lock_state();
                        let now = self.clock.epoch_millis();
                        match state.actions.get_mut(&action.id) {
                            Some(entry) => {
                                entry.mark_failed(error.to_string());
                                if entry.can_retry() {
                                    entry.schedule_retry(self.config.base_retry_delay, now);
                                    false
                                } else {
                                    state.actions.remove(&action.id);
                                    true
                                }
                            }
                            // Cancelled mid-flight; nothing left to update.
                            None => false,
                        }
                    };

                    result.errors.push(SyncFailure {
                        action_id: action.id.clone(),
                        kind: action.kind,
                        message: error.to_string(),
                        dropped,
                    });

                    if dropped {
                        warn!(
                            action_id = %action.id,
                            retries = action.retry_count + 1,
                            "action dropped after exhausting retries"
                        );
                        let _ = self.events.send(QueueEvent::ActionDropped {
                            id: action.id.clone(),
                            reason: DropReason::RetriesExhausted,
                        });
                    } else {
                        debug!(action_id = %action.id, "action rescheduled with backoff");
                    }
                }
            }
        }

        let now = self.clock.epoch_millis();
        self.lock_state().last_sync_at = Some(now);
        self.persist().await?;

        info!(
            processed = result.processed,
            failed = result.failed,
            "sync pass complete"
        );
        let _ = self.events.send(QueueEvent::SyncCompleted(result.clone()));
        Ok(result)
    }

    /// Spawn the background drain loop.
    ///
    /// The loop re-syncs whenever connectivity is restored or an action is
    /// enqueued, and on a periodic timer as a catch-all.
    pub fn spawn_drain(self: Arc<Self>, handler: Arc<dyn SyncHandler>) -> JoinHandle<()> {
        let queue = self;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = queue.notify.notified() => {}
                    () = tokio::time::sleep(queue.config.drain_interval) => {}
                }

                if queue.shutdown.load(AtomicOrdering::Relaxed) {
                    break;
                }
                if queue.is_online() && !queue.is_empty() {
                    if let Err(error) = queue.sync(handler.as_ref()).await {
                        warn!(error = %error, "background sync pass failed");
                    }
                }
            }
            debug!("drain loop stopped");
        })
    }

    /// Record a connectivity change; restoring connectivity wakes the drain
    /// loop immediately.
    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, AtomicOrdering::SeqCst);
        if was != online {
            info!(online, "connectivity changed");
            let _ = self
                .events
                .send(QueueEvent::ConnectivityChanged { online });
            if online {
                self.notify.notify_one();
            }
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(AtomicOrdering::SeqCst)
    }

    /// Subscribe to queue events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Store a value in the offline key/value store.
    pub async fn put_offline_data(&self, key: &str, value: serde_json::Value) -> QueueResult<()> {
        self.lock_state()
            .offline_data
            .insert(key.to_string(), value);
        self.persist().await
    }

    /// Read a value from the offline key/value store.
    pub fn offline_data(&self, key: &str) -> Option<serde_json::Value> {
        self.lock_state().offline_data.get(key).cloned()
    }

    /// Epoch-millis of the last completed sync pass, if any.
    pub fn last_sync_at(&self) -> Option<u64> {
        self.lock_state().last_sync_at
    }

    pub fn len(&self) -> usize {
        self.lock_state().actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock_state().actions.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<OfflineAction> {
        self.lock_state().actions.get(id).cloned()
    }

    /// All queued actions in drain order.
    pub fn pending(&self) -> Vec<OfflineAction> {
        let state = self.lock_state();
        let mut actions: Vec<OfflineAction> = state.actions.values().cloned().collect();
        actions.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        actions
    }

    /// Shut the queue down, persisting a final snapshot.
    pub async fn shutdown(&self) -> QueueResult<()> {
        info!("shutting down offline queue");
        self.shutdown.store(true, AtomicOrdering::Relaxed);
        self.notify.notify_waiters();
        self.persist().await
    }

    /// Remove expired actions, recording them in the result.
    fn sweep_expired(state: &mut QueueState, now: u64, result: &mut SyncResult) -> Vec<String> {
        let expired: Vec<String> = state
            .actions
            .values()
            .filter(|action| action.is_expired(now))
            .map(|action| action.id.clone())
            .collect();

        for id in &expired {
            if let Some(action) = state.actions.remove(id) {
                result.errors.push(SyncFailure {
                    action_id: action.id,
                    kind: action.kind,
                    message: "expired before sync".to_string(),
                    dropped: true,
                });
            }
        }
        expired
    }

    /// Pick the next eligible action: due, dependencies drained, highest
    /// priority, oldest first.
    fn select_next(state: &QueueState, now: u64) -> Option<OfflineAction> {
        state
            .actions
            .values()
            .filter(|action| action.is_due(now))
            .filter(|action| {
                action
                    .depends_on
                    .iter()
                    .all(|dep| !state.actions.contains_key(dep))
            })
            .min_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            })
            .cloned()
    }

    async fn persist(&self) -> QueueResult<()> {
        let Some(service) = &self.persistence else {
            return Ok(());
        };

        let snapshot = {
            let state = self.lock_state();
            PersistedQueueState::new(
                self.clock.epoch_millis(),
                state.last_sync_at,
                state.actions.values().cloned().collect(),
                state.offline_data.clone(),
            )
        };
        service.save(&snapshot).await
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("queue state lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("len", &self.len())
            .field("online", &self.is_online())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for enqueue rules, drain ordering, dependency gating,
    //! retry scheduling and drops.

    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::queue::types::{ActionKind, Priority};
    use crate::resilience::clock::MockClock;
    use prismflow_domain::PrismError;

    /// Handler that records applied action ids and fails a configured set.
    #[derive(Default)]
    struct ScriptedHandler {
        fail_ids: HashSet<String>,
        applied: StdMutex<Vec<String>>,
    }

    impl ScriptedHandler {
        fn failing(ids: &[&str]) -> Self {
            Self {
                fail_ids: ids.iter().map(|s| s.to_string()).collect(),
                applied: StdMutex::new(Vec::new()),
            }
        }

        fn applied(&self) -> Vec<String> {
            self.applied.lock().map(|v| v.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl SyncHandler for ScriptedHandler {
        async fn apply(&self, action: &OfflineAction) -> prismflow_domain::Result<()> {
            if let Ok(mut applied) = self.applied.lock() {
                applied.push(action.id.clone());
            }
            if self.fail_ids.contains(&action.id) {
                Err(PrismError::network("sync target unreachable"))
            } else {
                Ok(())
            }
        }
    }

    async fn queue_with_clock(clock: MockClock) -> Arc<OfflineQueue> {
        Arc::new(
            OfflineQueue::open_with_clock(QueueConfig::default(), Arc::new(clock))
                .await
                .expect("queue opens"),
        )
    }

    fn action_with_id(id: &str, priority: Priority, created_at: u64) -> OfflineAction {
        let mut action = OfflineAction::new(
            ActionKind::SaveDraft,
            serde_json::json!({"id": id}),
            priority,
            created_at,
        );
        action.id = id.to_string();
        action
    }

    /// Tests capacity and duplicate rejection on enqueue.
    #[tokio::test]
    async fn test_enqueue_capacity_and_duplicates() {
        let config = QueueConfig {
            capacity: 1,
            ..QueueConfig::default()
        };
        let queue = OfflineQueue::open_with_clock(config, Arc::new(MockClock::new()))
            .await
            .expect("queue opens");

        queue
            .enqueue(action_with_id("a-1", Priority::Normal, 0))
            .await
            .expect("first enqueue");

        let full = queue
            .enqueue(action_with_id("a-2", Priority::Normal, 0))
            .await;
        assert!(matches!(full, Err(QueueError::Full(1))));

        // Capacity error converts to the workspace QueueFull variant.
        let err: PrismError = full.unwrap_err().into();
        assert!(matches!(err, PrismError::QueueFull { capacity: 1 }));
    }

    /// Tests duplicate action ids are rejected.
    #[tokio::test]
    async fn test_enqueue_duplicate_rejected() {
        let queue = queue_with_clock(MockClock::new()).await;

        queue
            .enqueue(action_with_id("a-1", Priority::Normal, 0))
            .await
            .expect("enqueue");
        let dup = queue
            .enqueue(action_with_id("a-1", Priority::Normal, 0))
            .await;
        assert!(matches!(dup, Err(QueueError::Duplicate(_))));
    }

    /// Tests drain order: priority tiers first, FIFO inside a tier.
    #[tokio::test]
    async fn test_sync_priority_then_fifo_order() {
        let queue = queue_with_clock(MockClock::new()).await;

        queue
            .enqueue(action_with_id("low", Priority::Low, 10))
            .await
            .expect("enqueue");
        queue
            .enqueue(action_with_id("normal-late", Priority::Normal, 30))
            .await
            .expect("enqueue");
        queue
            .enqueue(action_with_id("normal-early", Priority::Normal, 20))
            .await
            .expect("enqueue");
        queue
            .enqueue(action_with_id("critical", Priority::Critical, 40))
            .await
            .expect("enqueue");

        let handler = ScriptedHandler::default();
        let result = queue.sync(&handler).await.expect("sync");

        assert_eq!(result.processed, 4);
        assert_eq!(
            handler.applied(),
            vec!["critical", "normal-early", "normal-late", "low"]
        );
        assert!(queue.is_empty());
    }

    /// Tests an action is never selected while its dependencies are still
    /// queued, and becomes eligible in the same pass once they drain.
    #[tokio::test]
    async fn test_dependency_gating() {
        let queue = queue_with_clock(MockClock::new()).await;

        // The dependent has higher priority than its dependency, so only
        // the gate keeps it from going first.
        let upload = action_with_id("upload", Priority::Normal, 10);
        let submit = action_with_id("submit", Priority::Critical, 20)
            .with_dependencies(vec!["upload".to_string()]);
        queue.enqueue(submit).await.expect("enqueue");
        queue.enqueue(upload).await.expect("enqueue");

        let handler = ScriptedHandler::default();
        let result = queue.sync(&handler).await.expect("sync");

        assert_eq!(result.processed, 2);
        assert_eq!(handler.applied(), vec!["upload", "submit"]);
    }

    /// Tests a dependent stays queued when its dependency fails and remains
    /// in the queue.
    #[tokio::test]
    async fn test_dependent_waits_for_failed_dependency() {
        let queue = queue_with_clock(MockClock::new()).await;

        let upload = action_with_id("upload", Priority::Normal, 10);
        let submit = action_with_id("submit", Priority::Critical, 20)
            .with_dependencies(vec!["upload".to_string()]);
        queue.enqueue(upload).await.expect("enqueue");
        queue.enqueue(submit).await.expect("enqueue");

        let handler = ScriptedHandler::failing(&["upload"]);
        let result = queue.sync(&handler).await.expect("sync");

        // Only the dependency was attempted; the dependent never ran.
        assert_eq!(handler.applied(), vec!["upload"]);
        assert_eq!(result.processed, 0);
        assert_eq!(result.failed, 1);
        assert!(queue.contains("upload"));
        assert!(queue.contains("submit"));
    }

    /// Tests failure scheduling: a failed action is rescheduled with backoff
    /// and retried once due again.
    #[tokio::test]
    async fn test_failed_action_rescheduled_with_backoff() {
        let clock = MockClock::new();
        let queue = queue_with_clock(clock.clone()).await;

        queue
            .enqueue(action_with_id("flaky", Priority::Normal, 0))
            .await
            .expect("enqueue");

        let handler = ScriptedHandler::failing(&["flaky"]);
        let result = queue.sync(&handler).await.expect("sync");
        assert_eq!(result.failed, 1);
        assert!(!result.errors[0].dropped);

        let action = queue.get("flaky").expect("still queued");
        assert_eq!(action.retry_count, 1);
        assert!(action.next_retry_at.is_some());

        // Not due yet: another pass attempts nothing.
        let result = queue.sync(&handler).await.expect("sync");
        assert_eq!(result.failed, 0);
        assert_eq!(handler.applied().len(), 1);

        // After the backoff elapses (base doubled once) the action retries.
        clock.advance_millis(2_001);
        let result = queue.sync(&handler).await.expect("sync");
        assert_eq!(result.failed, 1);
        assert_eq!(handler.applied().len(), 2);
    }

    /// Tests an action exceeding `max_retries` is dropped and reported,
    /// never retried again.
    #[tokio::test]
    async fn test_retries_exhausted_drops_and_reports() {
        let clock = MockClock::new();
        let queue = queue_with_clock(clock.clone()).await;

        let action = action_with_id("doomed", Priority::Normal, 0).with_max_retries(2);
        queue.enqueue(action).await.expect("enqueue");

        let handler = ScriptedHandler::failing(&["doomed"]);

        let result = queue.sync(&handler).await.expect("sync");
        assert!(!result.errors[0].dropped);

        clock.advance_millis(10_000);
        let result = queue.sync(&handler).await.expect("sync");
        assert!(result.errors[0].dropped, "second failure exhausts retries");
        assert!(!queue.contains("doomed"));

        // Nothing left to retry.
        clock.advance_millis(600_000);
        let result = queue.sync(&handler).await.expect("sync");
        assert_eq!(result.failed, 0);
        assert_eq!(handler.applied().len(), 2);
    }

    /// Tests expired actions are dropped without an attempt.
    #[tokio::test]
    async fn test_expired_actions_dropped_without_attempt() {
        let clock = MockClock::new();
        let queue = queue_with_clock(clock.clone()).await;

        let action = action_with_id("stale", Priority::Normal, 0).with_expiry(1_000);
        queue.enqueue(action).await.expect("enqueue");

        clock.advance_millis(2_000);
        let handler = ScriptedHandler::default();
        let result = queue.sync(&handler).await.expect("sync");

        assert!(handler.applied().is_empty());
        assert_eq!(result.processed, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].dropped);
        assert!(!queue.contains("stale"));
    }

    /// Tests `cancel` removes a queued action.
    #[tokio::test]
    async fn test_cancel_removes_action() {
        let queue = queue_with_clock(MockClock::new()).await;

        queue
            .enqueue(action_with_id("a-1", Priority::Normal, 0))
            .await
            .expect("enqueue");
        queue.cancel("a-1").await.expect("cancel");
        assert!(!queue.contains("a-1"));

        let missing = queue.cancel("a-1").await;
        assert!(matches!(missing, Err(QueueError::NotFound(_))));
    }

    /// Tests `last_sync_at` is recorded after a pass and offline data
    /// round-trips through the store.
    #[tokio::test]
    async fn test_last_sync_and_offline_data() {
        let clock = MockClock::new();
        clock.advance_millis(5_000);
        let queue = queue_with_clock(clock.clone()).await;

        assert!(queue.last_sync_at().is_none());
        queue
            .sync(&ScriptedHandler::default())
            .await
            .expect("sync");
        assert_eq!(queue.last_sync_at(), Some(5_000));

        queue
            .put_offline_data("draft", serde_json::json!({"body": "text"}))
            .await
            .expect("put");
        assert_eq!(
            queue.offline_data("draft"),
            Some(serde_json::json!({"body": "text"}))
        );
        assert!(queue.offline_data("missing").is_none());
    }

    /// Tests queue events are emitted for enqueue and sync completion.
    #[tokio::test]
    async fn test_events_emitted() {
        let queue = queue_with_clock(MockClock::new()).await;
        let mut events = queue.subscribe();

        queue
            .enqueue(action_with_id("a-1", Priority::Normal, 0))
            .await
            .expect("enqueue");
        queue
            .sync(&ScriptedHandler::default())
            .await
            .expect("sync");

        let mut saw_enqueued = false;
        let mut saw_completed = false;
        while let Ok(event) = events.try_recv() {
            match event {
                QueueEvent::ActionEnqueued { id, .. } => {
                    assert_eq!(id, "a-1");
                    saw_enqueued = true;
                }
                QueueEvent::SyncCompleted(result) => {
                    assert_eq!(result.processed, 1);
                    saw_completed = true;
                }
                _ => {}
            }
        }
        assert!(saw_enqueued);
        assert!(saw_completed);
    }

    /// Tests connectivity transitions emit events and only on change.
    #[tokio::test]
    async fn test_set_online_emits_on_change() {
        let queue = queue_with_clock(MockClock::new()).await;
        let mut events = queue.subscribe();

        queue.set_online(true); // no change
        queue.set_online(false);
        queue.set_online(false); // no change
        queue.set_online(true);

        let mut transitions = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let QueueEvent::ConnectivityChanged { online } = event {
                transitions.push(online);
            }
        }
        assert_eq!(transitions, vec![false, true]);
    }
}
