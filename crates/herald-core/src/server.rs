use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::auth::NoneAuth;
use crate::error::AppError;
use crate::traits::AuthProvider;

/// Remote API path templates, relative to the server base URL.
///
/// `{job}` expands to the watch's job path, `{number}` to a build number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiPaths {
    pub job_info: String,
    pub build_info: String,
    pub last_build_number: String,
}

impl Default for ApiPaths {
    fn default() -> Self {
        Self {
            job_info: "job/{job}/api/json".to_string(),
            build_info: "job/{job}/{number}/api/json".to_string(),
            last_build_number: "job/{job}/lastBuild/buildNumber".to_string(),
        }
    }
}

impl ApiPaths {
    pub fn job_info(&self, job: &str) -> String {
        self.job_info.replace("{job}", trim_job(job))
    }

    pub fn build_info(&self, job: &str, number: u64) -> String {
        self.build_info
            .replace("{job}", trim_job(job))
            .replace("{number}", &number.to_string())
    }

    pub fn last_build_number(&self, job: &str) -> String {
        self.last_build_number.replace("{job}", trim_job(job))
    }

    /// Human-facing URL of a job, used in persisted records and the job manifest.
    pub fn job_page(&self, job: &str) -> String {
        let info = self.job_info(job);
        info.strip_suffix("/api/json").unwrap_or(&info).to_string()
    }
}

fn trim_job(job: &str) -> &str {
    job.trim_matches('/')
}

/// Join a base URL and a path with exactly one separating slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// A configured remote build server.
#[derive(Debug, Clone)]
pub struct RemoteServer {
    pub id: String,
    pub display_name: String,
    pub url: String,
    /// Skip certificate-chain and hostname verification for this server.
    pub trust_all_certificates: bool,
    pub auth: Arc<dyn AuthProvider>,
    pub api: ApiPaths,
}

impl RemoteServer {
    /// Anonymous server with default API paths and certificate verification on.
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            url: url.into(),
            trust_all_certificates: false,
            auth: Arc::new(NoneAuth),
            api: ApiPaths::default(),
        }
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_trust_all_certificates(mut self, trust: bool) -> Self {
        self.trust_all_certificates = trust;
        self
    }

    pub fn with_api(mut self, api: ApiPaths) -> Self {
        self.api = api;
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Absolute URL for a path on this server.
    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.url, path)
    }
}

/// Snapshot of the configured servers, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ServerRegistry {
    servers: HashMap<String, RemoteServer>,
}

impl ServerRegistry {
    pub fn new(servers: Vec<RemoteServer>) -> Result<Self, AppError> {
        let mut map = HashMap::with_capacity(servers.len());
        for server in servers {
            if server.id.trim().is_empty() {
                return Err(AppError::ConfigError("Remote server id is empty".into()));
            }
            if map.contains_key(&server.id) {
                return Err(AppError::ConfigError(format!(
                    "Duplicate remote server id '{}'",
                    server.id
                )));
            }
            map.insert(server.id.clone(), server);
        }
        Ok(Self { servers: map })
    }

    pub fn get(&self, id: &str) -> Option<&RemoteServer> {
        self.servers.get(id)
    }

    pub fn resolve(&self, id: &str) -> Result<&RemoteServer, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::UnknownServer(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}
