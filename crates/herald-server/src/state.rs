use herald_core::error::AppError;
use herald_store::FileStoreFactory;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub stores: FileStoreFactory,
    /// Bearer token protecting `/v1` routes (None = open access).
    pub api_key: Option<String>,
}

/// Decide the `/v1` bearer token at startup.
///
/// A missing or blank key is only accepted when open access was requested
/// explicitly.
pub fn resolve_api_key(
    api_key: Option<String>,
    allow_anonymous: bool,
) -> Result<Option<String>, AppError> {
    match api_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => Ok(Some(key)),
        None if allow_anonymous => Ok(None),
        None => Err(AppError::ConfigError(
            "HERALD_SERVER_API_KEY must be set (or HERALD_SERVER_ALLOW_ANONYMOUS=true)".into(),
        )),
    }
}
