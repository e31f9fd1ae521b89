//! `herald.toml` loading and validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::auth::{HeaderAuth, NoneAuth, Secret, TokenAuth};
use crate::error::AppError;
use crate::models::BuildResult;
use crate::server::{ApiPaths, RemoteServer, ServerRegistry};
use crate::traits::AuthProvider;
use crate::trigger::anchored_pattern;
use crate::watch::{RemoteJobWatch, ResultCheck, generate_uid, is_valid_uid};

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_STATE_DIR: &str = ".herald";

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeraldConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub owners: Vec<OwnerConfig>,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub trust_all_certificates: bool,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub api: ApiPaths,
}

/// How requests to a server are authorized.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    #[default]
    None,
    /// HTTP Basic with a user name and API token.
    Token {
        username: String,
        #[serde(default)]
        api_token: Option<String>,
        #[serde(default)]
        api_token_env: Option<String>,
    },
    /// Raw `Authorization` value read from an environment variable.
    Header { env: String },
}

impl AuthConfig {
    fn provider(&self, server_id: &str) -> Result<Arc<dyn AuthProvider>, AppError> {
        match self {
            AuthConfig::None => Ok(Arc::new(NoneAuth)),
            AuthConfig::Token {
                username,
                api_token,
                api_token_env,
            } => {
                let secret = match (api_token, api_token_env) {
                    (Some(token), None) => Secret::Plain(token.clone()),
                    (None, Some(var)) => Secret::Env(var.clone()),
                    _ => {
                        return Err(AppError::ConfigError(format!(
                            "Server '{server_id}': token auth needs exactly one of api_token or api_token_env"
                        )));
                    }
                };
                Ok(Arc::new(TokenAuth::new(username.clone(), secret)))
            }
            AuthConfig::Header { env } => Ok(Arc::new(HeaderAuth::new(Secret::Env(env.clone())))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OwnerConfig {
    pub id: String,
    #[serde(default)]
    pub watches: Vec<WatchConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    pub server: String,
    pub job: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub trigger_results: Option<Vec<String>>,
    #[serde(default)]
    pub result_checks: Vec<ResultCheck>,
}

impl HeraldConfig {
    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Cannot read config '{}': {e}", path.display()))
        })?;
        let config = Self::parse(&raw).map_err(|e| match e {
            AppError::ConfigError(msg) => {
                AppError::ConfigError(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;
        tracing::debug!(
            path = %path.display(),
            servers = config.servers.len(),
            owners = config.owners.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let config: HeraldConfig =
            toml::from_str(raw).map_err(|e| AppError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check everything that can be checked without talking to a server.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.timeout_secs == 0 {
            return Err(AppError::ConfigError(
                "timeout_secs must be at least 1".into(),
            ));
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for server in &self.servers {
            if server.id.trim().is_empty() {
                return Err(AppError::ConfigError("Server id must not be empty".into()));
            }
            if !ids.insert(server.id.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "Duplicate server id '{}'",
                    server.id
                )));
            }
            let name = server.display_name.as_deref().unwrap_or(&server.id);
            if !names.insert(name) {
                return Err(AppError::ConfigError(format!(
                    "Duplicate server display name '{name}'"
                )));
            }
            validate_url(&server.id, &server.url)?;
            server.auth.provider(&server.id)?;
        }

        let mut owners = HashSet::new();
        for owner in &self.owners {
            if !is_valid_owner_id(&owner.id) {
                return Err(AppError::ConfigError(format!(
                    "Owner id '{}' may only contain letters, digits, '_', '-' and '.'",
                    owner.id
                )));
            }
            if !owners.insert(owner.id.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "Duplicate owner id '{}'",
                    owner.id
                )));
            }
            let mut uids = HashSet::new();
            for watch in &owner.watches {
                let watch = watch.to_watch(&owner.id)?;
                if !ids.contains(watch.server.as_str()) {
                    return Err(AppError::ConfigError(format!(
                        "Owner '{}': watch '{}' references unknown server '{}'",
                        owner.id, watch.uid, watch.server
                    )));
                }
                if !uids.insert(watch.uid.clone()) {
                    return Err(AppError::ConfigError(format!(
                        "Owner '{}': duplicate watch uid '{}'",
                        owner.id, watch.uid
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build the server registry.
    pub fn registry(&self) -> Result<ServerRegistry, AppError> {
        let servers = self
            .servers
            .iter()
            .map(|s| {
                let mut server = RemoteServer::new(&s.id, &s.url)
                    .with_trust_all_certificates(s.trust_all_certificates)
                    .with_auth(s.auth.provider(&s.id)?)
                    .with_api(s.api.clone());
                if let Some(name) = &s.display_name {
                    server = server.with_display_name(name);
                }
                Ok(server)
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        ServerRegistry::new(servers)
    }

    pub fn owner(&self, owner_id: &str) -> Result<&OwnerConfig, AppError> {
        self.owners
            .iter()
            .find(|o| o.id == owner_id)
            .ok_or_else(|| AppError::ConfigError(format!("Unknown owner '{owner_id}'")))
    }

    /// Watches of `owner_id`, in configuration order.
    pub fn watches_for(&self, owner_id: &str) -> Result<Vec<RemoteJobWatch>, AppError> {
        self.owner(owner_id)?
            .watches
            .iter()
            .map(|w| w.to_watch(owner_id))
            .collect()
    }
}

impl WatchConfig {
    fn to_watch(&self, owner_id: &str) -> Result<RemoteJobWatch, AppError> {
        if self.job.trim_matches('/').is_empty() {
            return Err(AppError::ConfigError(format!(
                "Owner '{owner_id}': watch on server '{}' has an empty job path",
                self.server
            )));
        }

        let uid = match self.uid.as_deref().map(str::trim) {
            Some(uid) if !uid.is_empty() => uid.to_string(),
            _ => {
                return Err(AppError::ConfigError(format!(
                    "Owner '{owner_id}': watch '{}' has no uid; add e.g. uid = \"{}\"",
                    self.job,
                    generate_uid()
                )));
            }
        };
        if !is_valid_uid(&uid) {
            return Err(AppError::ConfigError(format!(
                "Owner '{owner_id}': uid '{uid}' may only contain letters, digits, '_' and '-'"
            )));
        }

        let trigger_results = match &self.trigger_results {
            None => vec![BuildResult::Success],
            Some(names) => names
                .iter()
                .map(|n| n.parse::<BuildResult>().map_err(AppError::ConfigError))
                .collect::<Result<Vec<_>, _>>()?,
        };
        if trigger_results.is_empty() {
            return Err(AppError::ConfigError(format!(
                "Owner '{owner_id}': watch '{uid}' must select at least one trigger result"
            )));
        }

        for check in &self.result_checks {
            if check.key.trim().is_empty() {
                return Err(AppError::ConfigError(format!(
                    "Owner '{owner_id}': watch '{uid}' has a result check without a key"
                )));
            }
            anchored_pattern(&check.expected_value).map_err(|e| {
                AppError::ConfigError(format!(
                    "Owner '{owner_id}': watch '{uid}' pattern for '{}' is invalid: {e}",
                    check.key
                ))
            })?;
        }

        Ok(RemoteJobWatch::new(&self.server, &self.job)
            .with_uid(uid)
            .with_trigger_results(trigger_results)
            .with_result_checks(self.result_checks.clone()))
    }
}

fn validate_url(server_id: &str, raw: &str) -> Result<(), AppError> {
    let parsed = url::Url::parse(raw).map_err(|e| {
        AppError::ConfigError(format!("Server '{server_id}': invalid url '{raw}': {e}"))
    })?;
    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Ok(()),
        _ => Err(AppError::ConfigError(format!(
            "Server '{server_id}': url '{raw}' must be an http(s) URL with a host"
        ))),
    }
}

/// Owner ids name directories, so they may only contain `[A-Za-z0-9_.-]`.
pub fn is_valid_owner_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
