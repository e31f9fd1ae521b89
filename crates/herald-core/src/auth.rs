//! Authorization header providers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::AppError;
use crate::traits::AuthProvider;

/// Anonymous access.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneAuth;

impl AuthProvider for NoneAuth {
    fn resolve_header(&self) -> Result<Option<String>, AppError> {
        Ok(None)
    }
}

/// Where a secret comes from.
#[derive(Clone)]
pub enum Secret {
    Plain(String),
    /// Name of an environment variable read on every request.
    Env(String),
}

impl Secret {
    fn reveal(&self) -> Result<Option<String>, AppError> {
        match self {
            Secret::Plain(value) => Ok(Some(value.clone())),
            Secret::Env(var) => match std::env::var(var) {
                Ok(value) => Ok(Some(value)),
                Err(std::env::VarError::NotPresent) => Ok(None),
                Err(e) => Err(AppError::AuthError(format!("Cannot read ${var}: {e}"))),
            },
        }
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Secret::Plain(_) => write!(f, "Secret(***)"),
            Secret::Env(var) => write!(f, "Secret(${var})"),
        }
    }
}

/// User name + API token, sent as HTTP Basic.
#[derive(Debug, Clone)]
pub struct TokenAuth {
    username: String,
    api_token: Secret,
}

impl TokenAuth {
    pub fn new(username: impl Into<String>, api_token: Secret) -> Self {
        Self {
            username: username.into(),
            api_token,
        }
    }
}

impl AuthProvider for TokenAuth {
    fn resolve_header(&self) -> Result<Option<String>, AppError> {
        if self.username.is_empty() {
            return Ok(None);
        }
        let Some(token) = self.api_token.reveal()? else {
            tracing::warn!(username = %self.username, "API token not available, requesting anonymously");
            return Ok(None);
        };
        let encoded = STANDARD.encode(format!("{}:{}", self.username, token));
        Ok(Some(format!("Basic {encoded}")))
    }
}

/// A complete header value supplied by the host (e.g. a credential store
/// exporting `Bearer ...` into the environment).
#[derive(Debug, Clone)]
pub struct HeaderAuth {
    value: Secret,
}

impl HeaderAuth {
    pub fn new(value: Secret) -> Self {
        Self { value }
    }
}

impl AuthProvider for HeaderAuth {
    fn resolve_header(&self) -> Result<Option<String>, AppError> {
        Ok(self.value.reveal()?.filter(|v| !v.trim().is_empty()))
    }
}
