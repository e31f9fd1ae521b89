use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{BuildResult, compute_hash};

/// A `(key, pattern)` condition on the published result document.
///
/// `expected_value` is a regular expression that must match the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCheck {
    pub key: String,
    pub expected_value: String,
}

impl ResultCheck {
    pub fn new(key: impl Into<String>, expected_value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            expected_value: expected_value.into(),
        }
    }
}

/// A configured remote job to poll, together with its trigger policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteJobWatch {
    /// Id of the [`crate::server::RemoteServer`] hosting the job.
    pub server: String,
    /// Job path on the remote server, e.g. `app/job/main`.
    pub job: String,
    /// Random per-watch salt; doubles as the watch's namespace token.
    pub uid: String,
    #[serde(default = "default_trigger_results")]
    pub trigger_results: Vec<BuildResult>,
    #[serde(default)]
    pub result_checks: Vec<ResultCheck>,
}

fn default_trigger_results() -> Vec<BuildResult> {
    vec![BuildResult::Success]
}

impl RemoteJobWatch {
    /// New watch firing on `SUCCESS`, with a freshly generated uid.
    pub fn new(server: impl Into<String>, job: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            job: job.into(),
            uid: generate_uid(),
            trigger_results: default_trigger_results(),
            result_checks: Vec::new(),
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    pub fn with_trigger_results(mut self, results: Vec<BuildResult>) -> Self {
        self.trigger_results = results;
        self
    }

    pub fn with_result_check(mut self, check: ResultCheck) -> Self {
        self.result_checks.push(check);
        self
    }

    pub fn with_result_checks(mut self, checks: Vec<ResultCheck>) -> Self {
        self.result_checks = checks;
        self
    }

    /// Stable identity derived from every field of the watch.
    ///
    /// Identical configuration always yields the same id; editing the server,
    /// job, uid or trigger policy yields a new one.
    pub fn id(&self) -> String {
        // Hashed as a JSON tuple so field boundaries stay unambiguous.
        let identity = (
            &self.server,
            &self.job,
            &self.uid,
            &self.trigger_results,
            &self.result_checks,
        );
        compute_hash(&serde_json::to_string(&identity).unwrap_or_default())
    }

    pub fn triggers_on(&self, result: BuildResult) -> bool {
        self.trigger_results.contains(&result)
    }
}

/// Generate a random 32-character uid.
pub fn generate_uid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Uids may only contain `[A-Za-z0-9_-]`, since they end up in variable names.
pub fn is_valid_uid(uid: &str) -> bool {
    uid.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
