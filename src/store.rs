// src/store.rs
//! Run record storage: append-only writes and push-delivered reads

use crate::{
    error::{Result, TrackerError},
    recorder::RunRecord,
};
use async_trait::async_trait;
use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};
use tokio::{
    io::AsyncWriteExt,
    sync::{broadcast, Mutex},
};
use tracing::{debug, warn};

/// Which runs a reader is interested in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFilter {
    All,
    User(String),
}

impl RunFilter {
    pub fn matches(&self, record: &RunRecord) -> bool {
        match self {
            RunFilter::All => true,
            RunFilter::User(id) => record.user_id == *id,
        }
    }
}

/// Storage collaborator for run records
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist one record. Fails with `WriteError`.
    async fn append_run(&self, record: RunRecord) -> Result<()>;

    /// Records stored so far, oldest first
    fn runs(&self, filter: &RunFilter) -> Vec<RunRecord>;

    /// Stored records followed by every later append that matches `filter`
    fn stream_runs(&self, filter: RunFilter) -> RunStream;
}

/// Backlog first, then live appends. Ends only when the store is dropped.
pub struct RunStream {
    filter: RunFilter,
    backlog: VecDeque<RunRecord>,
    live: broadcast::Receiver<RunRecord>,
}

impl RunStream {
    /// Drop the backlog and only yield appends made from now on
    pub fn into_live(mut self) -> Self {
        self.backlog.clear();
        self
    }

    pub async fn next(&mut self) -> Option<RunRecord> {
        if let Some(record) = self.backlog.pop_front() {
            return Some(record);
        }

        loop {
            match self.live.recv().await {
                Ok(record) if self.filter.matches(&record) => return Some(record),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Run stream fell behind, {} updates skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

const LIVE_CAPACITY: usize = 64;

/// In-process run store
pub struct MemoryRunStore {
    records: RwLock<Vec<RunRecord>>,
    updates: broadcast::Sender<RunRecord>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<RunRecord>) -> Self {
        let (updates, _) = broadcast::channel(LIVE_CAPACITY);
        Self {
            records: RwLock::new(records),
            updates,
        }
    }

    fn push(&self, record: RunRecord) {
        // A reader subscribing concurrently may see this record twice, never zero times
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        // No receivers is fine
        let _ = self.updates.send(record);
    }
}

impl Default for MemoryRunStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn append_run(&self, record: RunRecord) -> Result<()> {
        self.push(record);
        Ok(())
    }

    fn runs(&self, filter: &RunFilter) -> Vec<RunRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    fn stream_runs(&self, filter: RunFilter) -> RunStream {
        let live = self.updates.subscribe();
        let backlog = self.runs(&filter).into();
        RunStream {
            filter,
            backlog,
            live,
        }
    }
}

/// Run store backed by a JSON-lines file
pub struct JsonFileRunStore {
    path: PathBuf,
    cache: MemoryRunStore,
    file_lock: Mutex<()>,
}

impl JsonFileRunStore {
    /// Open (or create on first append) the store at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut records = Vec::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                for (index, line) in contents.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<RunRecord>(line) {
                        Ok(record) => records.push(record),
                        Err(e) => warn!("Skipping bad record on line {} of {}: {}", index + 1, path.display(), e),
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(TrackerError::Io(e)),
        }

        debug!("Loaded {} runs from {}", records.len(), path.display());
        Ok(Self {
            path,
            cache: MemoryRunStore::with_records(records),
            file_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_line(&self, record: &RunRecord) -> std::result::Result<(), String> {
        let mut line = serde_json::to_string(record).map_err(|e| e.to_string())?;
        line.push('\n');

        let _guard = self.file_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| e.to_string())?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| e.to_string())?;
        file.write_all(line.as_bytes()).await.map_err(|e| e.to_string())?;
        file.flush().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl RunStore for JsonFileRunStore {
    async fn append_run(&self, record: RunRecord) -> Result<()> {
        self.write_line(&record)
            .await
            .map_err(|e| TrackerError::WriteError(format!("{}: {}", self.path.display(), e)))?;
        self.cache.push(record);
        Ok(())
    }

    fn runs(&self, filter: &RunFilter) -> Vec<RunRecord> {
        self.cache.runs(filter)
    }

    fn stream_runs(&self, filter: RunFilter) -> RunStream {
        self.cache.stream_runs(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(user: &str, distance_km: f64) -> RunRecord {
        RunRecord {
            user_id: user.to_string(),
            username: format!("{}-name", user),
            date: Utc::now(),
            distance_km,
            duration: "10m 0s".to_string(),
            elapsed_seconds: 600,
            average_speed_kmh: distance_km * 6.0,
        }
    }

    #[tokio::test]
    async fn test_memory_store_filters() {
        let store = MemoryRunStore::new();
        store.append_run(record("u1", 1.0)).await.unwrap();
        store.append_run(record("u2", 2.0)).await.unwrap();

        assert_eq!(store.runs(&RunFilter::All).len(), 2);
        let mine = store.runs(&RunFilter::User("u2".to_string()));
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].distance_km, 2.0);
    }

    #[tokio::test]
    async fn test_stream_backlog_then_live() {
        let store = MemoryRunStore::new();
        store.append_run(record("u1", 1.0)).await.unwrap();

        let mut stream = store.stream_runs(RunFilter::User("u1".to_string()));
        assert_eq!(stream.next().await.unwrap().distance_km, 1.0);

        store.append_run(record("u2", 9.0)).await.unwrap();
        store.append_run(record("u1", 3.0)).await.unwrap();
        assert_eq!(stream.next().await.unwrap().distance_km, 3.0);
    }

    #[tokio::test]
    async fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("runs.jsonl");

        let store = JsonFileRunStore::open(&path).await.unwrap();
        assert!(store.runs(&RunFilter::All).is_empty());
        store.append_run(record("u1", 4.2)).await.unwrap();
        store.append_run(record("u2", 1.5)).await.unwrap();
        drop(store);

        let reopened = JsonFileRunStore::open(&path).await.unwrap();
        let runs = reopened.runs(&RunFilter::All);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].user_id, "u1");
        assert_eq!(runs[1].distance_km, 1.5);
    }

    #[tokio::test]
    async fn test_file_store_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");
        let good = serde_json::to_string(&record("u1", 1.0)).unwrap();
        std::fs::write(&path, format!("{}\nnot json\n\n", good)).unwrap();

        let store = JsonFileRunStore::open(&path).await.unwrap();
        assert_eq!(store.runs(&RunFilter::All).len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");
        let store = JsonFileRunStore::open(&path).await.unwrap();

        // A directory in place of the file cannot be opened for appending
        std::fs::create_dir(&path).unwrap();

        let err = store.append_run(record("u1", 1.0)).await.unwrap_err();
        assert!(matches!(err, TrackerError::WriteError(_)));
        assert!(store.runs(&RunFilter::All).is_empty());
    }
}
