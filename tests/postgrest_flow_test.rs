use httpmock::prelude::*;
use httpmock::Method::PATCH;
use mep_approval::{
    ApprovalError, ApprovalOrchestrator, ApprovalRequest, HttpWorkflowClient,
    PostgrestQuotationStore, RetryPolicy, WorkflowFailure,
};
use serde_json::json;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn quotation_row(status: &str) -> serde_json::Value {
    json!([{
        "id": "Q1",
        "quotation_number": "QT-2024-001",
        "status": status,
        "analysis_data": {"pricing": {"grand_total": 1000, "currency": "USD"}},
        "total_amount": 1000,
        "approved_by": null,
        "approved_at": null,
        "error_message": null,
        "last_error_at": null
    }])
}

fn orchestrator(
    server: &MockServer,
) -> ApprovalOrchestrator<PostgrestQuotationStore, HttpWorkflowClient> {
    ApprovalOrchestrator::new(
        PostgrestQuotationStore::new(&server.base_url(), "service-role", "quotations"),
        HttpWorkflowClient::new(&server.url("/webhook/send-quotation"), Some("wf-token")),
        RetryPolicy {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(5),
            base_delay: Duration::from_millis(10),
        },
    )
}

#[tokio::test]
async fn test_edited_analysis_is_saved_conditionally_before_sending() {
    let server = MockServer::start();

    let lookup = server.mock(|when, then| {
        when.method(GET)
            .path("/rest/v1/quotations")
            .query_param("id", "eq.Q1");
        then.status(200).json_body(quotation_row("draft"));
    });
    let edit = server.mock(|when, then| {
        when.method(PATCH)
            .path("/rest/v1/quotations")
            .query_param("id", "eq.Q1")
            .query_param("status", "eq.draft")
            .body_contains(r#""total_amount":1500.0"#);
        then.status(200).json_body(quotation_row("draft"));
    });
    let workflow = server.mock(|when, then| {
        when.method(POST)
            .path("/webhook/send-quotation")
            .header("authorization", "Bearer wf-token");
        then.status(200).json_body(json!({"success": true, "message": "sent"}));
    });

    let request = ApprovalRequest::from_body(
        br#"{
            "quotation_id": "Q1",
            "user_id": "user-1",
            "updated_analysis_data": {"pricing": {"grand_total": 1500, "currency": "USD"}}
        }"#,
    )
    .unwrap();

    let result = assert_ok!(orchestrator(&server).approve(request).await);

    lookup.assert();
    edit.assert();
    workflow.assert();
    assert_eq!(result.client_information.total_amount, 1500.0);
    assert_eq!(result.quotation_details.quotation_number, "QT-2024-001");
}

#[tokio::test]
async fn test_terminal_workflow_failure_writes_rollback() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/rest/v1/quotations");
        then.status(200).json_body(quotation_row("draft"));
    });
    let workflow = server.mock(|when, then| {
        when.method(POST).path("/webhook/send-quotation");
        then.status(502).body("bad gateway");
    });
    let rollback = server.mock(|when, then| {
        when.method(PATCH)
            .path("/rest/v1/quotations")
            .query_param("id", "eq.Q1")
            .body_contains(r#""status":"draft""#)
            .body_contains(r#""approved_by":null"#)
            .body_contains(r#""approved_at":null"#)
            .body_contains("HTTP 502");
        then.status(200).json_body(quotation_row("draft"));
    });

    let request = ApprovalRequest::from_body(br#"{"quotation_id":"Q1","user_id":"user-1"}"#).unwrap();
    let err = assert_err!(orchestrator(&server).approve(request).await);

    assert!(matches!(
        err,
        ApprovalError::WorkflowError(WorkflowFailure::HttpStatus { status: 502, .. })
    ));
    workflow.assert_hits(1);
    rollback.assert();
}

#[tokio::test]
async fn test_store_outage_on_lookup_makes_no_writes() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/rest/v1/quotations");
        then.status(500).body("database unavailable");
    });
    let writes = server.mock(|when, then| {
        when.method(PATCH);
        then.status(200).json_body(json!([]));
    });
    let workflow = server.mock(|when, then| {
        when.method(POST);
        then.status(200).json_body(json!({"success": true}));
    });

    let request = ApprovalRequest::from_body(br#"{"quotation_id":"Q1","user_id":"user-1"}"#).unwrap();
    let err = assert_err!(orchestrator(&server).approve(request).await);

    assert!(matches!(err, ApprovalError::PersistenceError { .. }));
    writes.assert_hits(0);
    workflow.assert_hits(0);
}

#[tokio::test]
async fn test_failed_edit_write_aborts_before_workflow() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/rest/v1/quotations");
        then.status(200).json_body(quotation_row("draft"));
    });
    let edit = server.mock(|when, then| {
        when.method(PATCH)
            .path("/rest/v1/quotations")
            .query_param("status", "eq.draft");
        then.status(500).body("constraint violation");
    });
    let rollback = server.mock(|when, then| {
        when.method(PATCH)
            .path("/rest/v1/quotations")
            .body_contains(r#""status":"draft""#);
        then.status(200).json_body(quotation_row("draft"));
    });
    let workflow = server.mock(|when, then| {
        when.method(POST);
        then.status(200).json_body(json!({"success": true}));
    });

    let request = ApprovalRequest::from_body(
        br#"{"quotation_id":"Q1","user_id":"user-1","updated_analysis_data":{"pricing":{}}}"#,
    )
    .unwrap();
    let err = assert_err!(orchestrator(&server).approve(request).await);

    assert_eq!(err.status_code(), 500);
    assert!(matches!(err, ApprovalError::PersistenceError { .. }));
    edit.assert();
    rollback.assert();
    workflow.assert_hits(0);
}
