pub mod auth;
pub mod config;
pub mod env;
pub mod error;
pub mod extract;
pub mod models;
pub mod planner;
pub mod scan;
pub mod server;
pub mod traits;
pub mod trigger;
pub mod watch;

#[cfg(test)]
pub mod testutil;

pub use config::HeraldConfig;
pub use error::AppError;
pub use models::{BuildResult, BuildSnapshot, JobResultRecord, compute_hash};
pub use scan::{CycleReport, ScanReporter, ScanService, TracingScanReporter, WatchStatus};
pub use server::{RemoteServer, ServerRegistry};
pub use traits::{AuthProvider, RemoteApi, ResultStore, ResultStoreFactory};
pub use watch::{RemoteJobWatch, ResultCheck};
