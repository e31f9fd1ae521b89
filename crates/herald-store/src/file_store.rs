use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use herald_core::config::is_valid_owner_id;
use herald_core::error::AppError;
use herald_core::models::JobResultRecord;
use herald_core::traits::{ResultStore, ResultStoreFactory};
use serde_json::Value;

/// Name of the per-owner state file.
pub const STATE_FILE_NAME: &str = "remote-build-result.json";

/// Record list of one owner, stored as a pretty-printed JSON array.
///
/// Every operation holds the store's lock for a full read-modify-write, and
/// writes go to a temporary file that is renamed over the old one.
#[derive(Clone)]
pub struct FileResultStore {
    path: PathBuf,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl FileResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<JobResultRecord>, AppError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::StoreError(format!(
                    "Cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<Value> = serde_json::from_str(&raw).map_err(|e| {
            AppError::StoreError(format!("Corrupt state file {}: {e}", self.path.display()))
        })?;

        // An entry that fails to decode aborts the read; rewriting the list
        // without it would reset that watch's checked number.
        entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                serde_json::from_value::<JobResultRecord>(entry).map_err(|e| {
                    AppError::StoreError(format!(
                        "Unreadable record #{index} in {}: {e}",
                        self.path.display()
                    ))
                })
            })
            .collect()
    }

    async fn write(&self, records: &[JobResultRecord]) -> Result<(), AppError> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                AppError::StoreError(format!("Cannot create {}: {e}", dir.display()))
            })?;
        }

        let body = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| AppError::StoreError(format!("Cannot write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            AppError::StoreError(format!("Cannot replace {}: {e}", self.path.display()))
        })?;
        Ok(())
    }
}

impl ResultStore for FileResultStore {
    async fn get(&self, watch_id: &str) -> Result<Option<JobResultRecord>, AppError> {
        let _guard = self.lock.lock().await;
        let records = self.read().await?;
        Ok(records.into_iter().find(|r| r.watch_id == watch_id))
    }

    async fn list(&self) -> Result<Vec<JobResultRecord>, AppError> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    async fn upsert<F>(&self, watch_id: &str, mutate: F) -> Result<JobResultRecord, AppError>
    where
        F: FnOnce(&mut JobResultRecord) + Send,
    {
        let _guard = self.lock.lock().await;
        let mut records = self.read().await?;

        let pos = match records.iter().position(|r| r.watch_id == watch_id) {
            Some(pos) => pos,
            None => {
                records.push(JobResultRecord::new(watch_id));
                records.len() - 1
            }
        };
        mutate(&mut records[pos]);
        records[pos].watch_id = watch_id.to_string();

        self.write(&records).await?;
        tracing::debug!(
            path = %self.path.display(),
            %watch_id,
            checked = records[pos].checked_number,
            "Record saved"
        );
        Ok(records.swap_remove(pos))
    }

    async fn prune_missing(&self, current_ids: &[String]) -> Result<usize, AppError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read().await?;

        let before = records.len();
        records.retain(|r| current_ids.iter().any(|id| *id == r.watch_id));
        let removed = before - records.len();
        if removed > 0 {
            self.write(&records).await?;
        }
        Ok(removed)
    }
}

/// Maps owners to `<root>/<owner>/remote-build-result.json`.
///
/// Stores are cached so every handle for one owner shares the same lock.
#[derive(Clone)]
pub struct FileStoreFactory {
    root: PathBuf,
    stores: Arc<Mutex<HashMap<String, FileResultStore>>>,
}

impl FileStoreFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stores: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, owner_id: &str) -> PathBuf {
        self.root.join(owner_id).join(STATE_FILE_NAME)
    }
}

impl ResultStoreFactory for FileStoreFactory {
    type Store = FileResultStore;

    fn open(&self, owner_id: &str) -> Result<FileResultStore, AppError> {
        if !is_valid_owner_id(owner_id) {
            return Err(AppError::StoreError(format!(
                "Invalid owner id '{owner_id}'"
            )));
        }
        let mut stores = self
            .stores
            .lock()
            .map_err(|_| AppError::StoreError("Store cache lock poisoned".into()))?;
        let store = stores
            .entry(owner_id.to_string())
            .or_insert_with(|| FileResultStore::new(self.path_for(owner_id)));
        Ok(store.clone())
    }
}
