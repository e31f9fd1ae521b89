use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::integration::common::{
    OWNER, TEST_API_KEY, TestApp, seed, setup_test_app, setup_test_app_no_auth,
};

async fn get_json(app: &TestApp, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(uri)
                .header("authorization", format!("Bearer {TEST_API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::get(format!("/v1/owners/{OWNER}/records"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_api_key_returns_401() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::get(format!("/v1/owners/{OWNER}/env"))
                .header("authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn no_api_key_configured_allows_access() {
    let app = setup_test_app_no_auth().await;

    let response = app
        .router
        .oneshot(
            Request::get(format!("/v1/owners/{OWNER}/jobs"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn records_in_store_order() {
    let app = setup_test_app().await;
    seed(&app).await;

    let (status, json) = get_json(&app, &format!("/v1/owners/{OWNER}/records")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["owner"], OWNER);
    assert_eq!(json["total"], 2);
    assert_eq!(json["records"][0]["uid"], "app");
    assert_eq!(json["records"][0]["triggered_number"], 7);
    assert_eq!(json["records"][0]["build"]["number"], 7);
    assert_eq!(json["records"][1]["uid"], "lib");
    assert!(json["records"][1]["build"].is_null());
}

#[tokio::test]
async fn unknown_owner_has_no_records() {
    let app = setup_test_app().await;

    let (status, json) = get_json(&app, "/v1/owners/nobody/records").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 0);
}

#[tokio::test]
async fn invalid_owner_returns_404() {
    let app = setup_test_app().await;

    let (status, json) = get_json(&app, "/v1/owners/..%2Fetc/records").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn env_exports_namespaced_and_bare_keys() {
    let app = setup_test_app().await;
    seed(&app).await;

    let (status, json) = get_json(&app, &format!("/v1/owners/{OWNER}/env")).await;

    assert_eq!(status, StatusCode::OK);
    let env = &json["env"];
    assert_eq!(env["REMOTE_app_BUILD_NUMBER"], "7");
    assert_eq!(env["REMOTE_BUILD_NUMBER"], "7");
    assert_eq!(env["REMOTE_app_PARAMETER_BRANCH"], "main");
    assert_eq!(env["REMOTE_app_RESULT_version"], "1.2");
    assert_eq!(env["REMOTE_JOBS"], r#"["app","lib"]"#);
    assert!(env.get("REMOTE_lib_BUILD_NUMBER").is_none());
}

#[tokio::test]
async fn jobs_manifest() {
    let app = setup_test_app().await;
    seed(&app).await;

    let (status, json) = get_json(&app, &format!("/v1/owners/{OWNER}/jobs")).await;

    assert_eq!(status, StatusCode::OK);
    let jobs = json["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["job_url"], "http://ci/job/app");
    assert_eq!(jobs[1]["checked_number"], 3);
}

#[tokio::test]
async fn published_result_by_build_url() {
    let app = setup_test_app().await;
    seed(&app).await;

    let (status, json) = get_json(
        &app,
        &format!("/v1/owners/{OWNER}/result?build_url=http%3A%2F%2Fci%2Fjob%2Fapp%2F7%2F"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], "1.2");

    let (status, json) = get_json(
        &app,
        &format!("/v1/owners/{OWNER}/result?build_url=http%3A%2F%2Fci%2Fjob%2Fapp%2F6%2F"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({}));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["paths"]["/v1/owners/{owner}/env"].is_object());
}
