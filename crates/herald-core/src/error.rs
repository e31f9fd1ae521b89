use thiserror::Error;

/// Application-wide error types for Herald.
#[derive(Error, Debug)]
pub enum AppError {
    /// Network-level failure (connection refused, TLS handshake, reset, body read).
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// Request exceeded the configured timeout.
    #[error("Request to {url} timed out after {secs} seconds")]
    Timeout { url: String, secs: u64 },

    /// Remote answered with a non-2xx, non-404 status.
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Remote job or build does not exist (404 or empty body).
    #[error("Not found: {url}")]
    NotFound { url: String },

    /// Remote document violates the expected contract (e.g. no build number).
    #[error("Malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// A watch references a server id that is not configured.
    #[error("Unknown remote server '{0}'")]
    UnknownServer(String),

    /// Authorization header could not be resolved.
    #[error("Auth error: {0}")]
    AuthError(String),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Reading or writing persisted state failed.
    #[error("Store error: {0}")]
    StoreError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    /// Returns true if the next scheduled cycle may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Transport { .. } | AppError::Timeout { .. } => true,
            AppError::HttpStatus { status, .. } => *status != 404,
            _ => false,
        }
    }

    /// Returns true for 404-class "nothing there" conditions.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound { .. })
            || matches!(self, AppError::HttpStatus { status: 404, .. })
    }

    /// Returns true if the remote broke its response contract.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, AppError::MalformedResponse { .. })
    }
}
