//! Flattens persisted records into the downstream key/value surface.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::extract::render_value;
use crate::models::JobResultRecord;

pub const PREFIX: &str = "REMOTE_";
pub const JOBS_KEY: &str = "REMOTE_JOBS";

/// One entry of the job manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobManifestEntry {
    pub uid: String,
    pub job_url: String,
    pub triggered_number: Option<u64>,
    pub checked_number: u64,
}

/// Token identifying a record in the manifest: its uid, or the job URL when
/// the uid is blank.
pub fn job_token(record: &JobResultRecord) -> &str {
    if record.uid.trim().is_empty() {
        &record.job_url
    } else {
        &record.uid
    }
}

/// Namespace prefix of one record's keys, e.g. `REMOTE_abc_`.
pub fn record_prefix(record: &JobResultRecord) -> String {
    format!("{PREFIX}{}_", record.uid)
}

/// Export `records` (in store order) as environment variables.
///
/// Every record contributes keys under `REMOTE_<uid>_`; the first one is also
/// exported under the bare `REMOTE_` prefix. `REMOTE_JOBS` lists the tokens of
/// all records as a JSON array.
pub fn export_env(records: &[JobResultRecord]) -> BTreeMap<String, String> {
    let mut envs = BTreeMap::new();
    for (i, record) in records.iter().enumerate() {
        if i == 0 {
            record_envs(PREFIX, record, &mut envs);
        }
        record_envs(&record_prefix(record), record, &mut envs);
    }

    let jobs: Vec<&str> = records.iter().map(job_token).collect();
    envs.insert(
        JOBS_KEY.to_string(),
        serde_json::to_string(&jobs).unwrap_or_else(|_| "[]".to_string()),
    );
    envs
}

fn record_envs(prefix: &str, record: &JobResultRecord, envs: &mut BTreeMap<String, String>) {
    if let Some(build) = &record.build {
        envs.insert(format!("{prefix}BUILD_NUMBER"), build.number.to_string());
        envs.insert(
            format!("{prefix}BUILD_TIMESTAMP"),
            build.timestamp.map(|t| t.to_string()).unwrap_or_default(),
        );
        envs.insert(format!("{prefix}BUILD_URL"), build.url.clone());
        envs.insert(
            format!("{prefix}BUILD_RESULT"),
            build.result.clone().unwrap_or_default(),
        );
        for (name, value) in &build.parameters {
            envs.insert(format!("{prefix}PARAMETER_{name}"), value.clone());
        }
    }

    if let Some(published) = &record.published_result {
        for (key, value) in published {
            envs.insert(format!("{prefix}RESULT_{key}"), render_value(value));
        }
    }
}

/// Manifest of all records, in store order.
pub fn job_manifest(records: &[JobResultRecord]) -> Vec<JobManifestEntry> {
    records
        .iter()
        .map(|r| JobManifestEntry {
            uid: job_token(r).to_string(),
            job_url: r.job_url.clone(),
            triggered_number: r.triggered_number,
            checked_number: r.checked_number,
        })
        .collect()
}

/// Published result of the record whose fired build has `build_url`.
pub fn published_result_for<'a>(
    records: &'a [JobResultRecord],
    build_url: &str,
) -> Option<&'a serde_json::Map<String, serde_json::Value>> {
    let wanted = build_url.trim_end_matches('/');
    records
        .iter()
        .find(|r| {
            r.build_url()
                .is_some_and(|url| url.trim_end_matches('/') == wanted)
        })
        .and_then(|r| r.published_result.as_ref())
}
