//! HTTP surface: form page, SSE run endpoint, health and metrics

mod test_helpers;

use banking_bytes::agents::instructions::{PLANNER_AGENT, WRITER_AGENT};
use banking_bytes::testing::MockAgentInvoker;
use banking_bytes::web::routes;
use test_helpers::*;
use warp::http::StatusCode;

#[tokio::test]
async fn test_index_serves_form() {
    let (manager, _) = mock_manager(MockAgentInvoker::new());

    let response = warp::test::request()
        .method("GET")
        .path("/")
        .reply(&routes(manager))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = String::from_utf8_lossy(response.body());
    assert!(body.contains("Banking Bytes"));
    assert!(body.contains("EventSource"));
    // Rendered markdown goes through the sanitizer before reaching the page
    assert!(body.contains("DOMPurify.sanitize(marked.parse(markdown))"));
    assert!(!body.contains("innerHTML = marked.parse"));
}

#[tokio::test]
async fn test_run_streams_progress_until_report() {
    let (manager, _) = mock_manager(MockAgentInvoker::new());

    let response = warp::test::request()
        .method("GET")
        .path("/run?query=Deposit%20trends&email=reader%40example.com")
        .reply(&routes(manager))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(content_type.starts_with("text/event-stream"));

    let body = String::from_utf8_lossy(response.body());
    assert_eq!(body.matches("data:").count(), 6);
    assert!(body.contains("Sending email to reader@example.com..."));

    let report_at = body.find(r#""type":"report""#).unwrap();
    let sent_at = body.find("Email sent, research complete").unwrap();
    assert!(sent_at < report_at);
}

#[tokio::test]
async fn test_run_streams_single_failure() {
    let (manager, invoker) = mock_manager(MockAgentInvoker::new().failing_role(PLANNER_AGENT));

    let response = warp::test::request()
        .method("GET")
        .path("/run?query=Deposit%20trends&email=reader%40example.com")
        .reply(&routes(manager))
        .await;

    let body = String::from_utf8_lossy(response.body());
    assert_eq!(body.matches("data:").count(), 1);
    assert!(body.contains(r#""type":"failure""#));
    assert_eq!(invoker.calls_for(WRITER_AGENT), 0);
}

#[tokio::test]
async fn test_run_rejects_empty_inputs() {
    for path in [
        "/run?query=&email=reader%40example.com",
        "/run?query=rates&email=",
        "/run?email=reader%40example.com",
        "/run?query=rates&email=reader",
    ] {
        let (manager, invoker) = mock_manager(MockAgentInvoker::new());

        let response = warp::test::request()
            .method("GET")
            .path(path)
            .reply(&routes(manager))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
        assert_eq!(invoker.total_calls(), 0);
    }
}

#[tokio::test]
async fn test_health_and_metrics() {
    let (manager, _) = mock_manager(MockAgentInvoker::new());
    let filter = routes(manager);

    let health = warp::test::request().path("/health").reply(&filter).await;
    assert_eq!(health.status(), StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(health.body()).unwrap();
    assert_eq!(health["status"], "healthy");

    let metrics = warp::test::request().path("/metrics").reply(&filter).await;
    assert_eq!(metrics.status(), StatusCode::OK);
    let metrics: serde_json::Value = serde_json::from_slice(metrics.body()).unwrap();
    assert!(metrics.get("runs").is_some());
    assert!(metrics.get("uptime_seconds").is_some());
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let (manager, _) = mock_manager(MockAgentInvoker::new());

    let response = warp::test::request()
        .path("/nope")
        .reply(&routes(manager))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
