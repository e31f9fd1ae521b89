use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Categorical outcome of a completed remote build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    Success,
    Unstable,
    Failure,
    NotBuilt,
    Aborted,
}

impl BuildResult {
    pub const ALL: [BuildResult; 5] = [
        BuildResult::Success,
        BuildResult::Unstable,
        BuildResult::Failure,
        BuildResult::NotBuilt,
        BuildResult::Aborted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildResult::Success => "SUCCESS",
            BuildResult::Unstable => "UNSTABLE",
            BuildResult::Failure => "FAILURE",
            BuildResult::NotBuilt => "NOT_BUILT",
            BuildResult::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BuildResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SUCCESS" => Ok(BuildResult::Success),
            "UNSTABLE" => Ok(BuildResult::Unstable),
            "FAILURE" => Ok(BuildResult::Failure),
            "NOT_BUILT" => Ok(BuildResult::NotBuilt),
            "ABORTED" => Ok(BuildResult::Aborted),
            _ => Err(format!("Unknown build result: {}", s)),
        }
    }
}

/// Normalized view of one remote build, produced by [`crate::extract::extract`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSnapshot {
    pub number: u64,
    pub url: String,
    /// True while the remote reports either `building` or `inProgress`.
    pub building: bool,
    /// Raw result category; `None` while running.
    pub result: Option<String>,
    /// Start time in epoch milliseconds, as reported by the remote.
    pub timestamp: Option<i64>,
    /// Build parameters, keyed by parameter name.
    pub parameters: BTreeMap<String, String>,
    /// Remaining top-level scalar fields of the build document.
    pub attributes: Map<String, Value>,
    /// Document the remote build explicitly published.
    pub published_result: Option<Map<String, Value>>,
}

impl BuildSnapshot {
    pub fn is_complete(&self) -> bool {
        !self.building
    }

    /// Result category parsed into a known [`BuildResult`], if any.
    pub fn build_result(&self) -> Option<BuildResult> {
        self.result.as_deref().and_then(|r| r.parse().ok())
    }
}

/// Persisted bookkeeping for one watch, keyed by the watch id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobResultRecord {
    pub watch_id: String,
    pub server: String,
    pub job_url: String,
    pub uid: String,
    /// Highest build number that caused a fire.
    pub triggered_number: Option<u64>,
    /// Highest build number known to have been inspected.
    pub checked_number: u64,
    /// Last snapshot that satisfied the trigger policy.
    pub build: Option<BuildSnapshot>,
    pub published_result: Option<Map<String, Value>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobResultRecord {
    pub fn new(watch_id: impl Into<String>) -> Self {
        Self {
            watch_id: watch_id.into(),
            ..Self::default()
        }
    }

    /// Raise the checked number. Returns false (and changes nothing) if
    /// `number` would not move it forward.
    pub fn advance_checked(&mut self, number: u64) -> bool {
        if number > self.checked_number {
            self.checked_number = number;
            true
        } else {
            false
        }
    }

    /// Raise the triggered number, never lowering it.
    pub fn advance_triggered(&mut self, number: u64) -> bool {
        match self.triggered_number {
            Some(current) if current >= number => false,
            _ => {
                self.triggered_number = Some(number);
                true
            }
        }
    }

    pub fn build_url(&self) -> Option<&str> {
        self.build
            .as_ref()
            .map(|b| b.url.as_str())
            .filter(|u| !u.is_empty())
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
