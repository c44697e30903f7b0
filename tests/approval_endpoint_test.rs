use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use httpmock::prelude::*;
use mep_approval::{
    build_router, ApprovalOrchestrator, HttpWorkflowClient, InMemoryQuotationStore, Quotation,
    QuotationStatus, RetryPolicy,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        attempt_timeout: Duration::from_millis(300),
        base_delay: Duration::from_millis(10),
    }
}

async fn setup(workflow_url: &str) -> (Router, InMemoryQuotationStore) {
    let store = InMemoryQuotationStore::new();
    store.insert(Quotation::draft("Q1", "QT-2024-001")).await;

    let mut sent = Quotation::draft("Q2", "QT-2024-002");
    sent.status = QuotationStatus::Sent;
    store.insert(sent).await;

    let orchestrator = ApprovalOrchestrator::new(
        store.clone(),
        HttpWorkflowClient::new(workflow_url, None),
        fast_policy(),
    );
    (build_router(Arc::new(orchestrator)), store)
}

async fn call(router: &Router, method: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri("/approve-quotation")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");

    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*",
        "CORS header missing"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_approve_draft_quotation_end_to_end() {
    let server = MockServer::start();
    let workflow = server.mock(|when, then| {
        when.method(POST)
            .path("/webhook/send-quotation")
            .json_body(serde_json::json!({
                "quotation_id": "Q1",
                "user_id": "user-1",
                "action": "approve_and_send"
            }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(serde_json::json!({
                "success": true,
                "message": "sent",
                "quotation_details": {
                    "quotation_id": "Q1",
                    "status": "sent",
                    "sent_at": "2024-05-01T10:00:00Z"
                },
                "client_information": {
                    "client_name": "Acme Towers",
                    "project_name": "Tower B MEP",
                    "total_amount": 125000.0,
                    "currency": "AED"
                },
                "document_storage": {
                    "html_stored": true,
                    "html_available_for_pdf": true,
                    "pdf_generation": "client_side"
                },
                "workflow_metadata": {"execution_id": "exec-42"}
            }));
    });

    let (router, store) = setup(&server.url("/webhook/send-quotation")).await;
    let (status, body) = call(&router, "POST", r#"{"quotation_id":"Q1","user_id":"user-1"}"#).await;

    workflow.assert();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "sent");
    assert_eq!(body["message"], "sent");
    assert_eq!(body["quotation_details"]["quotation_number"], "QT-2024-001");
    assert_eq!(body["client_information"]["currency"], "AED");
    assert_eq!(body["document_storage"]["pdf_generation"], "client_side");
    assert_eq!(body["workflow_metadata"]["execution_id"], "exec-42");
    assert!(body["processing_time"].is_string());
    // 成功路徑不寫資料庫
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_already_sent_quotation_is_rejected() {
    let server = MockServer::start();
    let workflow = server.mock(|when, then| {
        when.method(POST);
        then.status(200).body(r#"{"success":true}"#);
    });

    let (router, store) = setup(&server.url("/hook")).await;
    let (status, body) = call(&router, "POST", r#"{"quotation_id":"Q2","user_id":"user-1"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("sent"));
    assert!(body["timestamp"].is_string());
    workflow.assert_hits(0);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_unknown_quotation_returns_404() {
    let server = MockServer::start();
    let workflow = server.mock(|when, then| {
        when.method(POST);
        then.status(200).body(r#"{"success":true}"#);
    });

    let (router, _store) = setup(&server.url("/hook")).await;
    let (status, _) = call(&router, "POST", r#"{"quotation_id":"Q404","user_id":"user-1"}"#).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    workflow.assert_hits(0);
}

#[tokio::test]
async fn test_workflow_http_error_is_not_retried_and_rolls_back() {
    let server = MockServer::start();
    let workflow = server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(500).body("workflow crashed");
    });

    let (router, store) = setup(&server.url("/hook")).await;
    let (status, body) = call(&router, "POST", r#"{"quotation_id":"Q1","user_id":"user-1"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("HTTP 500"));
    workflow.assert_hits(1);

    let row = store.get("Q1").await.unwrap();
    assert_eq!(row.status, QuotationStatus::Draft);
    assert!(row.error_message.is_some());
}

#[tokio::test]
async fn test_timed_out_attempts_are_retried_then_rolled_back() {
    let server = MockServer::start();
    let workflow = server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(200)
            .delay(Duration::from_secs(2))
            .body(r#"{"success":true}"#);
    });

    let (router, store) = setup(&server.url("/hook")).await;
    let (status, body) = call(&router, "POST", r#"{"quotation_id":"Q1","user_id":"user-1"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("after 3 attempts"));
    workflow.assert_hits(3);

    let row = store.get("Q1").await.unwrap();
    assert_eq!(row.status, QuotationStatus::Draft);
    assert!(row.approved_by.is_none());
    assert!(row.error_message.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_workflow_reporting_failure_is_500() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(200)
            .json_body(serde_json::json!({"success": false, "error": "client email missing"}));
    });

    let (router, store) = setup(&server.url("/hook")).await;
    let (status, body) = call(&router, "POST", r#"{"quotation_id":"Q1","user_id":"user-1"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("client email missing"));
    assert_eq!(store.get("Q1").await.unwrap().status, QuotationStatus::Draft);
}

#[tokio::test]
async fn test_method_handling() {
    let server = MockServer::start();
    let (router, _store) = setup(&server.url("/hook")).await;

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/approve-quotation")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(preflight).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-methods"],
        "POST, OPTIONS"
    );
    assert_eq!(response.headers()["content-type"], "application/json");

    let (status, body) = call(&router, "GET", "").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");
}

#[tokio::test]
async fn test_bad_request_bodies() {
    let server = MockServer::start();
    let (router, _store) = setup(&server.url("/hook")).await;

    for body in [
        "not json",
        r#"{"quotation_id":"Q1"}"#,
        r#"{"quotation_id":"  ","user_id":"user-1"}"#,
    ] {
        let (status, json) = call(&router, "POST", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(json["success"], false);
    }
}

#[tokio::test]
async fn test_oversized_body_keeps_cors_and_envelope() {
    let server = MockServer::start();
    let workflow = server.mock(|when, then| {
        when.method(POST);
        then.status(200).body(r#"{"success":true}"#);
    });
    let (router, store) = setup(&server.url("/hook")).await;

    let padding = "x".repeat(1_100_000);
    let body = format!(
        r#"{{"quotation_id":"Q1","user_id":"user-1","note":"{}"}}"#,
        padding
    );
    let (status, json) = call(&router, "POST", &body).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["success"], false);
    assert!(json["timestamp"].is_string());
    workflow.assert_hits(0);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = MockServer::start();
    let (router, _store) = setup(&server.url("/hook")).await;

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
