//! HTTP API tests

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use harbord::models::app::AppStatus;
use harbord::server::serve::router;
use harbord::server::state::ServerState;
use openapi_server::models::{
    AppListResponse, AppResponse, ErrorResponse, HealthResponse, JobCountsResponse,
    OperationResponse,
};
use serde::de::DeserializeOwned;

use crate::common::Harness;

fn app(harness: &Harness) -> Router {
    router(Arc::new(ServerState::new(
        harness.state.lifecycle.clone(),
        harness.state.queue.clone(),
        harness.state.broadcaster.clone(),
    )))
}

async fn call<T: DeserializeOwned>(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<&str>,
) -> (StatusCode, T) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let harness = Harness::new().await;
    let (status, health): (_, HealthResponse) =
        call(&app(&harness), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health.status, "healthy");
    assert_eq!(health.service, "harbord");
}

#[tokio::test]
async fn test_install_through_api() {
    let harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    let router = app(&harness);

    let (status, operation): (_, OperationResponse) = call(
        &router,
        Method::POST,
        "/apps/a/install",
        Some(r#"{"TEST_FIELD": "x"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(operation.app_id, "a");
    assert_eq!(operation.status, "installing");
    assert!(operation.job_id.is_some());

    let job_id = operation.job_id.unwrap();
    let result = harness
        .state
        .queue
        .wait_for(job_id, std::time::Duration::from_secs(30))
        .await
        .unwrap();
    assert!(result.success);

    let (status, list): (_, AppListResponse) = call(&router, Method::GET, "/apps", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.total, 1);

    let (_, counts): (_, JobCountsResponse) = call(&router, Method::GET, "/jobs", None).await;
    assert_eq!(counts.completed, 1);

    // reconciliation runs after the job result is published
    for _ in 0..100 {
        let (_, app): (_, AppResponse) = call(&router, Method::GET, "/apps/a", None).await;
        if app.status == AppStatus::Running.as_str() {
            assert_eq!(app.config.get("TEST_FIELD"), Some(&serde_json::json!("x")));
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("app a never reached running");
}

#[tokio::test]
async fn test_error_mapping() {
    let harness = Harness::new().await;
    let router = app(&harness);

    let (status, body): (_, ErrorResponse) = call(&router, Method::GET, "/apps/a", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.error.contains("not found"));

    let (status, _): (_, ErrorResponse) =
        call(&router, Method::POST, "/apps/a/start", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body): (_, ErrorResponse) =
        call(&router, Method::POST, "/apps/c/install", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.error.contains("999.0.0"));

    let (status, _): (_, ErrorResponse) = call(
        &router,
        Method::POST,
        "/apps/b/install",
        Some(r#"{"exposed": true}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
