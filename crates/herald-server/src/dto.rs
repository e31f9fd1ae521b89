use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use herald_core::env::JobManifestEntry;
use herald_core::models::{BuildSnapshot, JobResultRecord};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct BuildResponse {
    pub number: u64,
    pub url: String,
    pub building: bool,
    pub result: Option<String>,
    pub timestamp: Option<i64>,
    pub parameters: BTreeMap<String, String>,
    pub attributes: serde_json::Value,
}

impl From<BuildSnapshot> for BuildResponse {
    fn from(build: BuildSnapshot) -> Self {
        Self {
            number: build.number,
            url: build.url,
            building: build.building,
            result: build.result,
            timestamp: build.timestamp,
            parameters: build.parameters,
            attributes: serde_json::Value::Object(build.attributes),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RecordResponse {
    pub watch_id: String,
    pub uid: String,
    pub server: String,
    pub job_url: String,
    pub triggered_number: Option<u64>,
    pub checked_number: u64,
    pub build: Option<BuildResponse>,
    pub published_result: Option<serde_json::Value>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<JobResultRecord> for RecordResponse {
    fn from(record: JobResultRecord) -> Self {
        Self {
            watch_id: record.watch_id,
            uid: record.uid,
            server: record.server,
            job_url: record.job_url,
            triggered_number: record.triggered_number,
            checked_number: record.checked_number,
            build: record.build.map(Into::into),
            published_result: record.published_result.map(serde_json::Value::Object),
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RecordListResponse {
    pub owner: String,
    pub records: Vec<RecordResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct EnvResponse {
    pub owner: String,
    pub env: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct JobEntryResponse {
    /// Watch uid, or the job URL when the record has no uid.
    pub uid: String,
    pub job_url: String,
    pub triggered_number: Option<u64>,
    pub checked_number: u64,
}

impl From<JobManifestEntry> for JobEntryResponse {
    fn from(entry: JobManifestEntry) -> Self {
        Self {
            uid: entry.uid,
            job_url: entry.job_url,
            triggered_number: entry.triggered_number,
            checked_number: entry.checked_number,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct JobListResponse {
    pub owner: String,
    pub jobs: Vec<JobEntryResponse>,
}

// ---------------------------------------------------------------------------
// Published result
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResultQuery {
    /// URL of the remote build whose published result is wanted.
    pub build_url: String,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
