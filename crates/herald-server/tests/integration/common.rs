use std::sync::Arc;

use axum::Router;
use serde_json::json;
use tempfile::TempDir;

use herald_core::models::{BuildSnapshot, JobResultRecord};
use herald_core::traits::{ResultStore, ResultStoreFactory};
use herald_server::routes;
use herald_server::state::AppState;
use herald_store::FileStoreFactory;

pub const TEST_API_KEY: &str = "test-secret-key";
pub const OWNER: &str = "deploy";

pub struct TestApp {
    pub router: Router,
    pub stores: FileStoreFactory,
    /// Kept alive for the test duration; dropping it deletes the state dir.
    pub _dir: TempDir,
}

fn build(api_key: Option<&str>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let stores = FileStoreFactory::new(dir.path());
    let state = Arc::new(AppState {
        stores: stores.clone(),
        api_key: api_key.map(str::to_string),
    });
    TestApp {
        router: routes::router(state),
        stores,
        _dir: dir,
    }
}

/// App protected by [`TEST_API_KEY`], with an empty state dir.
pub async fn setup_test_app() -> TestApp {
    build(Some(TEST_API_KEY))
}

pub async fn setup_test_app_no_auth() -> TestApp {
    build(None)
}

/// Persist two records for [`OWNER`]: `app` fired on #7, `lib` only checked.
pub async fn seed(app: &TestApp) {
    let store = app.stores.open(OWNER).unwrap();
    store
        .upsert("id-app", |r| {
            r.uid = "app".into();
            r.server = "ci".into();
            r.job_url = "http://ci/job/app".into();
            r.build = Some(BuildSnapshot {
                number: 7,
                url: "http://ci/job/app/7/".into(),
                result: Some("SUCCESS".into()),
                timestamp: Some(1_700_000_000_000),
                parameters: [("BRANCH".to_string(), "main".to_string())].into(),
                ..BuildSnapshot::default()
            });
            r.published_result = json!({"version": "1.2"}).as_object().cloned();
            r.advance_triggered(7);
            r.advance_checked(7);
        })
        .await
        .unwrap();
    store
        .upsert("id-lib", |r: &mut JobResultRecord| {
            r.uid = "lib".into();
            r.job_url = "http://ci/job/lib".into();
            r.advance_checked(3);
        })
        .await
        .unwrap();
}
