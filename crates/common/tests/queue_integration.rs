//! Integration tests for offline queue durability and the connectivity
//! drain loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use prismflow_common::{
    ActionKind, OfflineAction, OfflineQueue, Priority, QueueConfig, SyncHandler,
};
use prismflow_domain::PrismError;

/// Handler that records applied actions and optionally fails some ids.
#[derive(Default)]
struct RecordingHandler {
    fail_ids: HashSet<String>,
    applied: StdMutex<Vec<String>>,
}

impl RecordingHandler {
    fn applied(&self) -> Vec<String> {
        self.applied.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SyncHandler for RecordingHandler {
    async fn apply(&self, action: &OfflineAction) -> prismflow_domain::Result<()> {
        if let Ok(mut applied) = self.applied.lock() {
            applied.push(action.id.clone());
        }
        if self.fail_ids.contains(&action.id) {
            Err(PrismError::network("unreachable"))
        } else {
            Ok(())
        }
    }
}

fn draft_action(id: &str) -> OfflineAction {
    let mut action = OfflineAction::new(
        ActionKind::SaveDraft,
        serde_json::json!({"body": "draft text"}),
        Priority::Normal,
        0,
    );
    action.id = id.to_string();
    action
}

/// Queue contents, offline data and the last-sync timestamp survive a
/// simulated process restart.
#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TempDir::new().expect("temp dir");
    let config = QueueConfig {
        persistence_path: Some(dir.path().join("queue.json")),
        ..QueueConfig::default()
    };

    {
        let queue = OfflineQueue::open(config.clone()).await.expect("open");
        queue.enqueue(draft_action("a-1")).await.expect("enqueue");
        queue.enqueue(draft_action("a-2")).await.expect("enqueue");
        queue
            .put_offline_data("profile", serde_json::json!({"theme": "dark"}))
            .await
            .expect("put");
        queue.shutdown().await.expect("shutdown");
        // Queue dropped here, simulating a crash-and-restart boundary.
    }

    let queue = OfflineQueue::open(config).await.expect("reopen");
    assert_eq!(queue.len(), 2);
    assert!(queue.contains("a-1"));
    assert!(queue.contains("a-2"));
    assert_eq!(
        queue.offline_data("profile"),
        Some(serde_json::json!({"theme": "dark"}))
    );

    // Draining after the restart works on the restored actions.
    let handler = RecordingHandler::default();
    let result = queue.sync(&handler).await.expect("sync");
    assert_eq!(result.processed, 2);
    assert!(queue.is_empty());
    assert!(queue.last_sync_at().is_some());
}

/// The last-sync timestamp itself is persisted and reloaded.
#[tokio::test]
async fn test_last_sync_timestamp_persisted() {
    let dir = TempDir::new().expect("temp dir");
    let config = QueueConfig {
        persistence_path: Some(dir.path().join("queue.json")),
        ..QueueConfig::default()
    };

    {
        let queue = OfflineQueue::open(config.clone()).await.expect("open");
        queue
            .sync(&RecordingHandler::default())
            .await
            .expect("sync");
        assert!(queue.last_sync_at().is_some());
    }

    let queue = OfflineQueue::open(config).await.expect("reopen");
    assert!(queue.last_sync_at().is_some());
}

/// Scenario: the device goes offline, the user saves a draft, connectivity
/// returns, and the drain loop processes exactly that one action.
#[tokio::test]
async fn test_drain_loop_processes_action_after_reconnect() {
    let config = QueueConfig {
        // Long timer so only the connectivity notification can wake the loop
        // within the test window.
        drain_interval: Duration::from_secs(3_600),
        ..QueueConfig::default()
    };
    let queue = Arc::new(OfflineQueue::open(config).await.expect("open"));
    let handler = Arc::new(RecordingHandler::default());
    let drain = Arc::clone(&queue).spawn_drain(Arc::clone(&handler) as Arc<dyn SyncHandler>);

    queue.set_online(false);
    queue.enqueue(draft_action("draft-1")).await.expect("enqueue");

    // Offline: nothing drains.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(queue.len(), 1);
    assert!(handler.applied().is_empty());

    // Back online: the loop wakes and syncs the draft.
    queue.set_online(true);
    let mut drained = false;
    for _ in 0..50 {
        if queue.is_empty() {
            drained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(drained, "queue should drain after reconnect");
    assert_eq!(handler.applied(), vec!["draft-1"]);

    queue.shutdown().await.expect("shutdown");
    drain.abort();
}

/// A failing action is retried by a later pass and its reschedule survives
/// a restart.
#[tokio::test]
async fn test_failed_action_backoff_survives_restart() {
    let dir = TempDir::new().expect("temp dir");
    let config = QueueConfig {
        persistence_path: Some(dir.path().join("queue.json")),
        ..QueueConfig::default()
    };

    {
        let queue = OfflineQueue::open(config.clone()).await.expect("open");
        queue.enqueue(draft_action("flaky")).await.expect("enqueue");

        let handler = RecordingHandler {
            fail_ids: ["flaky".to_string()].into_iter().collect(),
            ..RecordingHandler::default()
        };
        let result = queue.sync(&handler).await.expect("sync");
        assert_eq!(result.failed, 1);
    }

    let queue = OfflineQueue::open(config).await.expect("reopen");
    let action = queue.get("flaky").expect("action restored");
    assert_eq!(action.retry_count, 1);
    assert!(action.next_retry_at.is_some(), "backoff schedule restored");
}
