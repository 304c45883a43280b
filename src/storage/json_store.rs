//! JSON file history store
//!
//! Keeps the full history as a pretty-printed JSON array. Every append rewrites
//! the file through a temporary sibling and an atomic rename, so the file on
//! disk always holds a complete array. Reads are served from the in-memory
//! snapshot of committed records.

use super::HistoryStore;
use crate::models::{CycleDraft, CycleRecord};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use serde::de::Error as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub struct JsonHistoryStore {
    path: PathBuf,
    records: RwLock<Vec<CycleRecord>>,
}

impl JsonHistoryStore {
    /// Open the store at `path`, loading any existing history.
    /// A missing file is an empty history; an unreadable or corrupt one is an
    /// error, since the next append would otherwise overwrite it.
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();

        let records = match fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => {
                let records: Vec<CycleRecord> = serde_json::from_str(&content)?;
                Self::check_ids(&path, &records)?;
                records
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No history file found at {:?}, starting empty", path);
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        info!(records = records.len(), "Opened cycle history at {:?}", path);

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_ids(path: &Path, records: &[CycleRecord]) -> AppResult<()> {
        for pair in records.windows(2) {
            if pair[1].id <= pair[0].id {
                return Err(AppError::Serialization(serde_json::Error::custom(format!(
                    "history at {:?} has non-increasing ids ({} then {})",
                    path, pair[0].id, pair[1].id
                ))));
            }
            if pair[1].id != pair[0].id + 1 {
                warn!(
                    after = pair[0].id,
                    next = pair[1].id,
                    "Gap in stored cycle ids"
                );
            }
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn write_all(&self, records: &[CycleRecord]) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(records)?;
        let temp = self.temp_path();
        fs::write(&temp, content).await?;
        fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn append(&self, draft: CycleDraft) -> AppResult<u64> {
        let mut records = self.records.write().await;
        let id = records.last().map_or(1, |r| r.id + 1);
        let record = draft.into_record(id);

        let mut next = Vec::with_capacity(records.len() + 1);
        next.extend_from_slice(&records);
        next.push(record);

        self.write_all(&next).await?;
        *records = next;

        debug!(id, "Appended cycle record");
        Ok(id)
    }

    async fn get_last(&self) -> Option<CycleRecord> {
        self.records.read().await.last().cloned()
    }

    async fn get_recent(&self, window: usize) -> Vec<CycleRecord> {
        let records = self.records.read().await;
        let start = records.len().saturating_sub(window);
        records[start..].to_vec()
    }

    async fn next_id(&self) -> u64 {
        self.records.read().await.last().map_or(1, |r| r.id + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CyclePhase;
    use crate::testing::{draft, operation_draft};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn open_in(dir: &TempDir) -> JsonHistoryStore {
        JsonHistoryStore::open(dir.path().join("history.json"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir).await;

        assert!(store.is_empty().await);
        assert!(store.get_last().await.is_none());
        assert!(store.get_recent(5).await.is_empty());
        assert_eq!(store.next_id().await, 1);
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir).await;

        let mut ids = Vec::new();
        for i in 0..10 {
            ids.push(store.append(operation_draft(100 + i, 4.0)).await.unwrap());
        }

        assert_eq!(ids, (1..=10).collect::<Vec<u64>>());
        assert_eq!(store.next_id().await, 11);
        assert_eq!(store.get_last().await.unwrap().id, 10);
    }

    #[tokio::test]
    async fn test_concurrent_appends_have_no_gaps() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(open_in(&dir).await);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.append(operation_draft(60 + i, 3.9)).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=16).collect::<Vec<u64>>());

        let stored: Vec<u64> = store.get_recent(100).await.iter().map(|r| r.id).collect();
        assert_eq!(stored, (1..=16).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_get_recent_returns_latest_in_append_order() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir).await;
        for wait in [60, 90, 120, 150, 180, 210, 240] {
            store.append(operation_draft(wait, 4.1)).await.unwrap();
        }

        let recent = store.get_recent(3).await;
        let ids: Vec<u64> = recent.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 6, 7]);
        let waits: Vec<u32> = recent.iter().map(|r| r.input.wait_minutes).collect();
        assert_eq!(waits, vec![180, 210, 240]);

        assert_eq!(store.get_recent(50).await.len(), 7);
        assert!(store.get_recent(0).await.is_empty());
    }

    #[tokio::test]
    async fn test_reopen_restores_history() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("history.json");

        let first = draft(CyclePhase::Calibration, 120, 0.0, "");
        let second = operation_draft(300, 4.123456789012345);
        {
            let store = JsonHistoryStore::open(&path).await.unwrap();
            store.append(first.clone()).await.unwrap();
            store.append(second.clone()).await.unwrap();
        }
        let expected_first = first.into_record(1);
        let expected_second = second.into_record(2);

        let reopened = JsonHistoryStore::open(&path).await.unwrap();
        let records = reopened.get_recent(10).await;
        assert_eq!(records, vec![expected_first, expected_second]);
        assert_eq!(reopened.next_id().await, 3);
        assert!(!dir.path().join("nested").join("history.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "[{\"id\": 1, \"timestamp\": ").unwrap();

        let result = JsonHistoryStore::open(&path).await;
        assert!(matches!(result, Err(AppError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_out_of_order_ids_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        let records = vec![
            operation_draft(120, 4.0).into_record(2),
            operation_draft(150, 4.1).into_record(2),
        ];
        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

        let result = JsonHistoryStore::open(&path).await;
        assert!(matches!(result, Err(AppError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_id_gap_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        let records = vec![
            operation_draft(120, 4.0).into_record(1),
            operation_draft(150, 4.1).into_record(3),
        ];
        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

        let store = JsonHistoryStore::open(&path).await.unwrap();
        assert_eq!(store.next_id().await, 4);
        assert_eq!(store.path(), path.as_path());
    }

    #[tokio::test]
    async fn test_failed_append_leaves_snapshot_untouched() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir).await;
        store.append(operation_draft(120, 4.0)).await.unwrap();

        // A directory squatting on the temp path makes the write fail
        std::fs::create_dir(dir.path().join("history.json.tmp")).unwrap();
        let result = store.append(operation_draft(150, 4.2)).await;

        assert!(matches!(result, Err(AppError::Storage(_))));
        assert_eq!(store.get_recent(10).await.len(), 1);
        assert_eq!(store.next_id().await, 2);

        let reopened = open_in(&dir).await;
        assert_eq!(reopened.get_last().await.unwrap().input.wait_minutes, 120);
    }
}
