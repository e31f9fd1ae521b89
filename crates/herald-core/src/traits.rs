use std::fmt;
use std::future::Future;

use crate::error::AppError;
use crate::models::JobResultRecord;
use crate::server::RemoteServer;

/// Resolves the `Authorization` header value for a remote server.
///
/// `Ok(None)` (or an empty string) means anonymous access.
pub trait AuthProvider: fmt::Debug + Send + Sync {
    fn resolve_header(&self) -> Result<Option<String>, AppError>;
}

/// Authenticated GET access to a remote build server.
pub trait RemoteApi: Send + Sync + Clone {
    /// Fetch and decode a JSON document.
    ///
    /// A 404 or an empty body yields [`AppError::NotFound`].
    fn get_json(
        &self,
        server: &RemoteServer,
        path: &str,
    ) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;

    /// Fetch a plain-text body, trimmed.
    fn get_text(
        &self,
        server: &RemoteServer,
        path: &str,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Persists [`JobResultRecord`]s for one owner.
///
/// Every call is a complete read-modify-write of the owner's record list.
pub trait ResultStore: Send + Sync + Clone {
    fn get(
        &self,
        watch_id: &str,
    ) -> impl Future<Output = Result<Option<JobResultRecord>, AppError>> + Send;

    /// All records, in persisted order.
    fn list(&self) -> impl Future<Output = Result<Vec<JobResultRecord>, AppError>> + Send;

    /// Locate or create the record for `watch_id`, apply `mutate`, persist it
    /// and return the stored value.
    fn upsert<F>(
        &self,
        watch_id: &str,
        mutate: F,
    ) -> impl Future<Output = Result<JobResultRecord, AppError>> + Send
    where
        F: FnOnce(&mut JobResultRecord) + Send;

    /// Remove records whose id is not in `current_ids`. Returns how many were removed.
    fn prune_missing(
        &self,
        current_ids: &[String],
    ) -> impl Future<Output = Result<usize, AppError>> + Send;
}

/// Opens the [`ResultStore`] that belongs to an owner.
pub trait ResultStoreFactory: Send + Sync + Clone {
    type Store: ResultStore;

    fn open(&self, owner_id: &str) -> Result<Self::Store, AppError>;
}
