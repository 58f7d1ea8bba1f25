//! Queue persistence
//!
//! The queue snapshot (pending actions, offline key/value data, last-sync
//! timestamp) is written as one JSON document through a temp-file-then-rename
//! sequence so a crash mid-write never corrupts the previous snapshot. A
//! sha256 sidecar detects torn or tampered files on load.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use prismflow_domain::PrismError;

use super::errors::QueueResult;
use super::types::{OfflineAction, OfflineData};

/// Persistence format version
const PERSISTENCE_VERSION: u32 = 1;

/// Everything the queue must remember across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedQueueState {
    pub version: u32,
    pub saved_at: u64,
    pub last_sync_at: Option<u64>,
    pub actions: Vec<OfflineAction>,
    pub offline_data: OfflineData,
}

impl PersistedQueueState {
    pub fn new(
        saved_at: u64,
        last_sync_at: Option<u64>,
        actions: Vec<OfflineAction>,
        offline_data: OfflineData,
    ) -> Self {
        Self {
            version: PERSISTENCE_VERSION,
            saved_at,
            last_sync_at,
            actions,
            offline_data,
        }
    }
}

/// Writes and reads queue snapshots.
#[derive(Debug, Clone)]
pub struct PersistenceService {
    path: PathBuf,
}

impl PersistenceService {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Save a snapshot to disk atomically.
    #[instrument(skip(self, state), fields(actions = state.actions.len()))]
    pub async fn save(&self, state: &PersistedQueueState) -> QueueResult<()> {
        let data = serde_json::to_vec(state).map_err(PrismError::from)?;

        let temp_path = self.path.with_extension("tmp");
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).await.map_err(PrismError::from)?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .await
            .map_err(PrismError::from)?;
        file.write_all(&data).await.map_err(PrismError::from)?;
        file.sync_all().await.map_err(PrismError::from)?;
        drop(file);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(PrismError::from)?;

        // Best effort; a missing sidecar only disables verification.
        let checksum_path = self.path.with_extension("sha256");
        fs::write(&checksum_path, checksum(&data)).await.ok();

        debug!(
            actions = state.actions.len(),
            bytes = data.len(),
            "queue snapshot persisted"
        );
        Ok(())
    }

    /// Load the last snapshot, if any.
    ///
    /// A missing file is a clean first start. A corrupted or
    /// version-mismatched file is logged and treated as empty rather than
    /// taking the queue down.
    #[instrument(skip(self))]
    pub async fn load(&self) -> QueueResult<Option<PersistedQueueState>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no queue snapshot on disk");
            return Ok(None);
        }

        let data = fs::read(&self.path).await.map_err(PrismError::from)?;

        let checksum_path = self.path.with_extension("sha256");
        if checksum_path.exists() {
            if let Ok(expected) = fs::read_to_string(&checksum_path).await {
                if checksum(&data) != expected.trim() {
                    warn!(
                        path = %self.path.display(),
                        "queue snapshot checksum mismatch, ignoring snapshot"
                    );
                    return Ok(None);
                }
            }
        }

        let state: PersistedQueueState = match serde_json::from_slice(&data) {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "queue snapshot unreadable, ignoring snapshot"
                );
                return Ok(None);
            }
        };

        if state.version != PERSISTENCE_VERSION {
            warn!(
                expected = PERSISTENCE_VERSION,
                found = state.version,
                "queue snapshot version mismatch, ignoring snapshot"
            );
            return Ok(None);
        }

        info!(actions = state.actions.len(), "queue snapshot loaded");
        Ok(Some(state))
    }

    /// Delete the snapshot and its checksum sidecar.
    pub async fn delete(&self) -> QueueResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).await.map_err(PrismError::from)?;
        }
        let checksum_path = self.path.with_extension("sha256");
        if checksum_path.exists() {
            fs::remove_file(&checksum_path).await.ok();
        }
        Ok(())
    }
}

fn checksum(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    //! Unit tests for snapshot round-trips and corruption handling.

    use tempfile::TempDir;

    use super::*;
    use crate::queue::types::{ActionKind, Priority};

    fn sample_state() -> PersistedQueueState {
        let action = OfflineAction::new(
            ActionKind::SubmitJob,
            serde_json::json!({"job": "spec"}),
            Priority::Critical,
            1_000,
        );
        let mut offline_data = OfflineData::new();
        offline_data.insert("draft".to_string(), serde_json::json!({"body": "text"}));
        PersistedQueueState::new(2_000, Some(1_500), vec![action], offline_data)
    }

    /// Tests a snapshot survives a save/load round trip intact.
    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = TempDir::new().expect("temp dir");
        let service = PersistenceService::new(dir.path().join("queue.json"));

        let state = sample_state();
        service.save(&state).await.expect("save");

        let loaded = service.load().await.expect("load").expect("snapshot");
        assert_eq!(loaded.actions.len(), 1);
        assert_eq!(loaded.last_sync_at, Some(1_500));
        assert_eq!(loaded.actions[0].kind, ActionKind::SubmitJob);
        assert!(loaded.offline_data.contains_key("draft"));
    }

    /// Tests a missing file loads as a clean first start.
    #[tokio::test]
    async fn test_missing_file_is_clean_start() {
        let dir = TempDir::new().expect("temp dir");
        let service = PersistenceService::new(dir.path().join("queue.json"));

        assert!(service.load().await.expect("load").is_none());
    }

    /// Tests a corrupted snapshot is ignored instead of failing startup.
    #[tokio::test]
    async fn test_corrupted_snapshot_ignored() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("queue.json");
        let service = PersistenceService::new(path.clone());

        service.save(&sample_state()).await.expect("save");
        tokio::fs::write(&path, b"{not json").await.expect("corrupt");

        assert!(service.load().await.expect("load").is_none());
    }

    /// Tests `delete` removes snapshot and sidecar.
    #[tokio::test]
    async fn test_delete_removes_files() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("queue.json");
        let service = PersistenceService::new(path.clone());

        service.save(&sample_state()).await.expect("save");
        assert!(path.exists());

        service.delete().await.expect("delete");
        assert!(!path.exists());
        assert!(!path.with_extension("sha256").exists());
    }
}
