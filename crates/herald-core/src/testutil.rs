//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::JobResultRecord;
use crate::scan::{ScanEvent, ScanReporter};
use crate::server::RemoteServer;
use crate::traits::{RemoteApi, ResultStore, ResultStoreFactory};

// ---------------------------------------------------------------------------
// MockRemoteApi
// ---------------------------------------------------------------------------

/// Canned response for one path.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Json(Value),
    Text(String),
    NotFound,
    Status(u16),
    Transport,
}

impl MockResponse {
    fn into_json(self, url: String) -> Result<Value, AppError> {
        match self {
            MockResponse::Json(v) => Ok(v),
            MockResponse::Text(t) => serde_json::from_str(&t).map_err(|e| AppError::Transport {
                url,
                message: format!("Unexpected non-JSON body: {e}"),
            }),
            other => Err(other.into_error(url)),
        }
    }

    fn into_text(self, url: String) -> Result<String, AppError> {
        match self {
            MockResponse::Text(t) => Ok(t.trim().to_string()),
            MockResponse::Json(v) => Ok(v.to_string()),
            other => Err(other.into_error(url)),
        }
    }

    fn into_error(self, url: String) -> AppError {
        match self {
            MockResponse::NotFound => AppError::NotFound { url },
            MockResponse::Status(status) => AppError::HttpStatus { status, url },
            _ => AppError::Transport {
                url,
                message: "connection refused".into(),
            },
        }
    }
}

/// Mock remote API answering from a path → response table.
///
/// Unknown paths answer 404. Every requested path is recorded.
#[derive(Clone, Default)]
pub struct MockRemoteApi {
    routes: Arc<Mutex<HashMap<String, MockResponse>>>,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl MockRemoteApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, path: impl Into<String>, response: MockResponse) -> &Self {
        self.routes.lock().unwrap().insert(path.into(), response);
        self
    }

    /// Register a Jenkins-shaped job at `job` with builds `first..=last`.
    pub fn job(&self, job: &str, first: u64, last: u64) -> &Self {
        self.route(
            format!("job/{job}/api/json"),
            MockResponse::Json(json!({
                "name": job,
                "firstBuild": {"number": first},
                "lastBuild": {"number": last},
                "nextBuildNumber": last + 1,
            })),
        );
        self.route(
            format!("job/{job}/lastBuild/buildNumber"),
            MockResponse::Text(format!("{last}\n")),
        )
    }

    /// Register a completed build with the given result.
    pub fn build(&self, job: &str, number: u64, result: &str) -> &Self {
        self.build_doc(job, number, build_json(job, number, Some(result), false, None))
    }

    pub fn build_doc(&self, job: &str, number: u64, doc: Value) -> &Self {
        self.route(format!("job/{job}/{number}/api/json"), MockResponse::Json(doc))
    }

    pub fn requested(&self, path: &str) -> bool {
        self.requests.lock().unwrap().iter().any(|p| p == path)
    }
}

impl RemoteApi for MockRemoteApi {
    async fn get_json(&self, server: &RemoteServer, path: &str) -> Result<Value, AppError> {
        self.requests.lock().unwrap().push(path.to_string());
        let response = self.routes.lock().unwrap().get(path).cloned();
        response
            .unwrap_or(MockResponse::NotFound)
            .into_json(server.url_for(path))
    }

    async fn get_text(&self, server: &RemoteServer, path: &str) -> Result<String, AppError> {
        self.requests.lock().unwrap().push(path.to_string());
        let response = self.routes.lock().unwrap().get(path).cloned();
        response
            .unwrap_or(MockResponse::NotFound)
            .into_text(server.url_for(path))
    }
}

/// Jenkins-shaped build document.
pub fn build_json(
    job: &str,
    number: u64,
    result: Option<&str>,
    building: bool,
    published: Option<Value>,
) -> Value {
    let mut actions = vec![json!({
        "_class": crate::extract::PARAMETERS_ACTION,
        "parameters": [{"name": "BRANCH", "value": "main"}]
    })];
    if let Some(published) = published {
        actions.push(json!({
            "_class": crate::extract::PUBLISHED_RESULT_ACTION,
            "result": published,
        }));
    }
    json!({
        "_class": "hudson.model.FreeStyleBuild",
        "number": number,
        "url": format!("http://ci.test/job/{job}/{number}/"),
        "building": building,
        "result": result,
        "timestamp": 1_700_000_000_000_i64 + number as i64,
        "actions": actions,
    })
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory store that keeps records in insertion order.
#[derive(Clone, Default)]
pub struct MockStore {
    pub records: Arc<Mutex<Vec<JobResultRecord>>>,
    pub upserts: Arc<Mutex<usize>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MockStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<JobResultRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            ..Self::default()
        }
    }

    /// Store whose writes fail.
    pub fn failing() -> Self {
        Self {
            fail_writes: Arc::new(Mutex::new(true)),
            ..Self::default()
        }
    }

    pub fn record(&self, watch_id: &str) -> Option<JobResultRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.watch_id == watch_id)
            .cloned()
    }

    pub fn upsert_count(&self) -> usize {
        *self.upserts.lock().unwrap()
    }
}

impl ResultStore for MockStore {
    async fn get(&self, watch_id: &str) -> Result<Option<JobResultRecord>, AppError> {
        Ok(self.record(watch_id))
    }

    async fn list(&self) -> Result<Vec<JobResultRecord>, AppError> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn upsert<F>(&self, watch_id: &str, mutate: F) -> Result<JobResultRecord, AppError>
    where
        F: FnOnce(&mut JobResultRecord) + Send,
    {
        if *self.fail_writes.lock().unwrap() {
            return Err(AppError::StoreError("disk full".into()));
        }
        *self.upserts.lock().unwrap() += 1;
        let mut records = self.records.lock().unwrap();
        let pos = match records.iter().position(|r| r.watch_id == watch_id) {
            Some(pos) => pos,
            None => {
                records.push(JobResultRecord::new(watch_id));
                records.len() - 1
            }
        };
        mutate(&mut records[pos]);
        records[pos].watch_id = watch_id.to_string();
        Ok(records[pos].clone())
    }

    async fn prune_missing(&self, current_ids: &[String]) -> Result<usize, AppError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| current_ids.contains(&r.watch_id));
        Ok(before - records.len())
    }
}

// ---------------------------------------------------------------------------
// MockStoreFactory
// ---------------------------------------------------------------------------

/// Hands out one shared [`MockStore`] per owner.
#[derive(Clone, Default)]
pub struct MockStoreFactory {
    stores: Arc<Mutex<HashMap<String, MockStore>>>,
}

impl MockStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(owner_id: &str, store: MockStore) -> Self {
        let factory = Self::default();
        factory
            .stores
            .lock()
            .unwrap()
            .insert(owner_id.to_string(), store);
        factory
    }

    pub fn store(&self, owner_id: &str) -> MockStore {
        self.stores
            .lock()
            .unwrap()
            .entry(owner_id.to_string())
            .or_default()
            .clone()
    }
}

impl ResultStoreFactory for MockStoreFactory {
    type Store = MockStore;

    fn open(&self, owner_id: &str) -> Result<MockStore, AppError> {
        Ok(self.store(owner_id))
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock scan reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == label)
            .count()
    }
}

impl ScanReporter for MockReporter {
    fn report(&self, event: ScanEvent<'_>) {
        let label = match &event {
            ScanEvent::CycleStarted { .. } => "CycleStarted",
            ScanEvent::Pruned { .. } => "Pruned",
            ScanEvent::Planned { .. } => "Planned",
            ScanEvent::BuildMissing { .. } => "BuildMissing",
            ScanEvent::BuildVetoed { .. } => "BuildVetoed",
            ScanEvent::WatchFinished { .. } => "WatchFinished",
            ScanEvent::CycleFinished { .. } => "CycleFinished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}
