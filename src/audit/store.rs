//! File-backed audit store.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{AuditId, AuditLogEntry, NewAuditEntry, StorageError};
use crate::core::storage::{write_atomic, FileLock};

const FORMAT_VERSION: u32 = 1;

/// On-disk layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditFile {
    #[serde(default)]
    version: u32,
    /// Never decreases, not even on clear
    next_id: AuditId,
    #[serde(default)]
    entries: Vec<AuditLogEntry>,
}

impl Default for AuditFile {
    fn default() -> Self {
        Self { version: FORMAT_VERSION, next_id: 1, entries: Vec::new() }
    }
}

/// A loaded log with its secondary indices.
#[derive(Debug, Default)]
struct OpenLog {
    file: AuditFile,
    by_timestamp: BTreeMap<DateTime<Utc>, Vec<AuditId>>,
    by_action_type: HashMap<String, Vec<AuditId>>,
}

impl OpenLog {
    fn new(file: AuditFile) -> Self {
        let mut log = Self { file, ..Self::default() };
        for entry in &log.file.entries {
            log.by_timestamp.entry(entry.timestamp).or_default().push(entry.id);
            log.by_action_type.entry(entry.action_type.clone()).or_default().push(entry.id);
        }
        log
    }

    fn lookup(&self, ids: impl IntoIterator<Item = AuditId>) -> Vec<AuditLogEntry> {
        // Ids are assigned in increasing order, so entries stay sorted by id.
        ids.into_iter()
            .filter_map(|id| {
                self.file
                    .entries
                    .binary_search_by_key(&id, |e| e.id)
                    .ok()
                    .map(|i| self.file.entries[i].clone())
            })
            .collect()
    }
}

/// Durable audit store.
///
/// Several processes may share one file. Every write takes the file lock,
/// reloads the log and its `nextId` from disk, and replaces the file
/// atomically before releasing the lock. Reads see the last completed write.
pub struct AuditStore {
    path: PathBuf,
    writes: Mutex<()>,
}

impl std::fmt::Debug for AuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditStore").field("path", &self.path).finish()
    }
}

impl AuditStore {
    /// Create a store for the given file. Nothing touches the disk yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), writes: Mutex::new(()) }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist an entry and return its store-assigned id.
    pub async fn add_entry(&self, entry: NewAuditEntry) -> Result<AuditId, StorageError> {
        let _writes = self.writes.lock().await;
        let _lock = self.lock().await?;
        let mut file = self.load().await?;

        let id = file.next_id;
        let entry = entry.into_entry(id);
        let action_type = entry.action_type.clone();
        file.next_id += 1;
        file.entries.push(entry);
        self.persist(&file).await?;

        tracing::debug!(id, action = %action_type, "Audit entry recorded");
        Ok(id)
    }

    /// All entries, in id order.
    pub async fn get_all(&self) -> Result<Vec<AuditLogEntry>, StorageError> {
        Ok(self.load().await?.entries)
    }

    /// Entries with the given action type.
    pub async fn by_action_type(&self, action_type: &str) -> Result<Vec<AuditLogEntry>, StorageError> {
        let log = self.open().await?;
        let ids = log.by_action_type.get(action_type).cloned().unwrap_or_default();
        Ok(log.lookup(ids))
    }

    /// Entries with `from <= timestamp < to`, oldest first.
    pub async fn between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditLogEntry>, StorageError> {
        if from >= to {
            return Ok(Vec::new());
        }

        let log = self.open().await?;
        let ids: Vec<AuditId> =
            log.by_timestamp.range(from..to).flat_map(|(_, ids)| ids.iter().copied()).collect();
        let mut entries = log.lookup(ids);
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    /// Remove every entry. Irreversible; ids are not reused afterwards.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let _writes = self.writes.lock().await;
        let _lock = self.lock().await?;
        let mut file = self.load().await?;

        let removed = file.entries.len();
        file.entries.clear();
        self.persist(&file).await?;

        tracing::debug!(removed, next_id = file.next_id, "Audit log cleared");
        Ok(())
    }

    async fn open(&self) -> Result<OpenLog, StorageError> {
        let file = self.load().await?;
        tracing::trace!(path = %self.path.display(), entries = file.entries.len(), "Audit log opened");
        Ok(OpenLog::new(file))
    }

    /// Take the cross-process write lock. Blocks a pool thread, not the runtime.
    async fn lock(&self) -> Result<FileLock, StorageError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || FileLock::exclusive(&path))
            .await
            .map_err(std::io::Error::other)
            .and_then(|locked| locked)
            .map_err(|source| StorageError::Open { path: self.path.clone(), source })
    }

    async fn load(&self) -> Result<AuditFile, StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Open { path: self.path.clone(), source })?;
        }

        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let mut file: AuditFile = serde_json::from_str(&content).map_err(|e| {
                    StorageError::Corrupt { path: self.path.clone(), message: e.to_string() }
                })?;
                file.entries.sort_by_key(|e| e.id);
                // Guard against a hand-edited counter.
                let max_id = file.entries.last().map_or(0, |e| e.id);
                file.next_id = file.next_id.max(max_id + 1);
                Ok(file)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AuditFile::default()),
            Err(source) => Err(StorageError::Open { path: self.path.clone(), source }),
        }
    }

    async fn persist(&self, file: &AuditFile) -> Result<(), StorageError> {
        let content = serde_json::to_vec_pretty(file)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, &content))
            .await
            .map_err(std::io::Error::other)
            .and_then(|written| written)
            .map_err(|source| StorageError::Write { path: self.path.clone(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::actions;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn store_in(dir: &tempfile::TempDir) -> AuditStore {
        AuditStore::new(dir.path().join("audit.json"))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_add_then_get_all_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let input = NewAuditEntry::new(actions::IMAGE_RISK_ANALYZED, at(0))
            .detail("page", "RiskDetection")
            .detail("analysisLength", 120);
        let id = store.add_entry(input.clone()).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].timestamp, input.timestamp);
        assert_eq!(all[0].action_type, input.action_type);
        assert_eq!(all[0].details, input.details);
    }

    #[tokio::test]
    async fn test_ids_are_distinct_and_increasing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let a = store.add_entry(NewAuditEntry::now("A")).await.unwrap();
        let b = store.add_entry(NewAuditEntry::now("B")).await.unwrap();
        let c = store.add_entry(NewAuditEntry::now("C")).await.unwrap();
        assert!(a < b && b < c);
    }

    #[tokio::test]
    async fn test_clear_empties_and_never_reuses_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.add_entry(NewAuditEntry::now("A")).await.unwrap();
        let last = store.add_entry(NewAuditEntry::now("B")).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
        assert!(store.by_action_type("A").await.unwrap().is_empty());

        let next = store.add_entry(NewAuditEntry::now("C")).await.unwrap();
        assert!(next > last);
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let first = store_in(&dir);
        first.add_entry(NewAuditEntry::now("A")).await.unwrap();
        let b = first.add_entry(NewAuditEntry::now("B")).await.unwrap();
        drop(first);

        let second = store_in(&dir);
        let all = second.get_all().await.unwrap();
        assert_eq!(all.iter().map(|e| e.action_type.as_str()).collect::<Vec<_>>(), ["A", "B"]);

        let c = second.add_entry(NewAuditEntry::now("C")).await.unwrap();
        assert_eq!(c, b + 1);
    }

    #[tokio::test]
    async fn test_secondary_index_queries() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.add_entry(NewAuditEntry::new("A", at(10))).await.unwrap();
        store.add_entry(NewAuditEntry::new("B", at(20))).await.unwrap();
        store.add_entry(NewAuditEntry::new("A", at(30))).await.unwrap();
        store.add_entry(NewAuditEntry::new("A", at(5))).await.unwrap();

        let a = store.by_action_type("A").await.unwrap();
        assert_eq!(a.len(), 3);

        let window = store.between(at(6), at(30)).await.unwrap();
        let times: Vec<_> = window.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![at(10), at(20)]);

        assert!(store.between(at(30), at(6)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_two_handles_share_one_id_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.json");
        let a = AuditStore::new(&path);
        let b = AuditStore::new(&path);
        a.get_all().await.unwrap();
        b.get_all().await.unwrap();

        let first = a.add_entry(NewAuditEntry::now("FROM_A")).await.unwrap();
        let second = b.add_entry(NewAuditEntry::now("FROM_B")).await.unwrap();
        let third = a.add_entry(NewAuditEntry::now("FROM_A2")).await.unwrap();
        assert_eq!([first, second, third], [1, 2, 3]);

        let on_disk = AuditStore::new(&path).get_all().await.unwrap();
        let seen: Vec<_> = on_disk.iter().map(|e| (e.id, e.action_type.as_str())).collect();
        assert_eq!(seen, [(1, "FROM_A"), (2, "FROM_B"), (3, "FROM_A2")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.json");
        let stores: Vec<_> = (0..4).map(|_| Arc::new(AuditStore::new(&path))).collect();

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let store = stores[i % stores.len()].clone();
                tokio::spawn(async move { store.add_entry(NewAuditEntry::now(format!("E{i}"))).await })
            })
            .collect();
        let mut ids: Vec<AuditId> = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());

        assert_eq!(stores[0].get_all().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_clear_through_another_handle_keeps_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.json");
        let a = AuditStore::new(&path);
        let b = AuditStore::new(&path);

        let last = a.add_entry(NewAuditEntry::now("A")).await.unwrap();
        b.clear().await.unwrap();
        assert!(a.get_all().await.unwrap().is_empty());

        let next = a.add_entry(NewAuditEntry::now("B")).await.unwrap();
        assert!(next > last);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.json");
        std::fs::write(&path, "not json").unwrap();

        let store = AuditStore::new(&path);
        let err = store.add_entry(NewAuditEntry::now("A")).await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_unopenable_location_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let store = AuditStore::new(blocker.join("audit.json"));
        assert!(store.get_all().await.is_err());
    }
}
