// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP tests against a wiremock server.
//!
//! Exercise the reqwest transport end to end: URLs, auth headers, query
//! parameters, bodies, and how timeouts and refused connections map onto
//! engine errors.

mod common;

use common::{MemoryDeadLetterSink, RecordingNotifier, RecordingRefresher};
use integration_engine::classifier::{ErrorHandler, HandlerWaits};
use integration_engine::config::IntegrationConfig;
use integration_engine::coordinator::{RunOutcome, StatusRegistry};
use integration_engine::error::IntegrationError;
use integration_engine::model::{DocumentKind, EntityType, SyncJob, TriggerSource};
use integration_engine::pipeline::SyncPipeline;
use integration_engine::source::SourceClient;
use integration_engine::transport::{HttpTransport, OutboundRequest, ReqwestTransport};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Test Helpers
// =============================================================================

fn pipeline() -> (SyncPipeline<ReqwestTransport>, Arc<MemoryDeadLetterSink>) {
    let sink = Arc::new(MemoryDeadLetterSink::default());
    let handler = ErrorHandler::new(
        Arc::new(RecordingNotifier::default()),
        Arc::new(RecordingRefresher::default()),
        HandlerWaits::default(),
    );
    let pipeline = SyncPipeline::new(
        Arc::new(ReqwestTransport::new()),
        handler,
        sink.clone(),
        Arc::new(StatusRegistry::new()),
    );
    (pipeline, sink)
}

fn run_job(entity: EntityType, config: &IntegrationConfig) -> SyncJob {
    SyncJob::new(entity, TriggerSource::Manual, config.sync.schedule(entity).batch_size)
}

fn employee(id: &str) -> Value {
    json!({ "employee_id": id, "full_name": format!("Employee {id}"), "status": "inactive" })
}

async fn received_json(server: &MockServer, http_method: &str, url_path: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == http_method && r.url.path() == url_path)
        .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
        .collect()
}

// =============================================================================
// Source reads
// =============================================================================

#[tokio::test]
async fn test_source_fetch_sends_batch_and_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/employees"))
        .and(query_param("batch", "2"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [employee("E1"), employee("E2"), employee("E3")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = IntegrationConfig::for_testing(&server.uri());
    let batch = SourceClient::from_config(&config)
        .fetch(&ReqwestTransport::new(), DocumentKind::Employee, 2)
        .await
        .unwrap();

    // The source ignored the batch size; the client cuts the surplus.
    assert_eq!(batch.records.len(), 2);
    assert_eq!(batch.records[1]["employee_id"], "E2");
}

#[tokio::test]
async fn test_source_error_status_maps_to_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/expense-claims"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such endpoint"))
        .mount(&server)
        .await;

    let config = IntegrationConfig::for_testing(&server.uri());
    let err = SourceClient::from_config(&config)
        .fetch(&ReqwestTransport::new(), DocumentKind::ExpenseClaim, 10)
        .await
        .unwrap_err();

    match err {
        IntegrationError::Http { status, message, .. } => {
            assert_eq!(status, 404);
            assert!(message.contains("no such endpoint"));
        }
        other => panic!("Expected Http error, got {other:?}"),
    }
}

// =============================================================================
// Transport failures
// =============================================================================

#[tokio::test]
async fn test_slow_response_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let request = OutboundRequest::new(
        Method::GET,
        format!("{}/api/employees", server.uri()),
        Duration::from_millis(100),
    );
    let err = ReqwestTransport::new().send(request).await.unwrap_err();
    assert!(matches!(err, IntegrationError::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_refused_connection_maps_to_connection_error() {
    let request = OutboundRequest::new(
        Method::GET,
        "http://127.0.0.1:1/api/employees",
        Duration::from_secs(2),
    );
    let err = ReqwestTransport::new().send(request).await.unwrap_err();
    assert!(matches!(err, IntegrationError::Connection { .. }), "got {err:?}");
}

// =============================================================================
// Destinations end to end
// =============================================================================

#[tokio::test]
async fn test_employee_sync_posts_to_primary_with_token_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/employees"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [employee("E1"), employee("E2")] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/resource/Employee"))
        .and(header("authorization", "token test-key:test-secret"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let config = IntegrationConfig::for_testing(&server.uri());
    let (pipeline, _) = pipeline();
    let outcome = pipeline
        .run(run_job(EntityType::Employee, &config), Arc::new(config))
        .await;
    assert_eq!(outcome.outcome, RunOutcome::Succeeded);

    let bodies = received_json(&server, "POST", "/api/resource/Employee").await;
    let batch = bodies[0]["employees"].as_array().unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0]["employee_number"], "E1");
    assert_eq!(batch[0]["status"], "Inactive");
}

#[tokio::test]
async fn test_doctype_with_space_is_percent_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/payroll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "SLIP-9", "employee_id": "E1", "gross_pay": "1200.00" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/resource/Salary%20Slip"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let config = IntegrationConfig::for_testing(&server.uri());
    let (pipeline, _) = pipeline();
    let outcome = pipeline
        .run(run_job(EntityType::Payroll, &config), Arc::new(config))
        .await;

    assert_eq!(outcome.outcome, RunOutcome::Succeeded);
    let bodies = received_json(&server, "POST", "/api/resource/Salary%20Slip").await;
    assert_eq!(bodies[0]["hr_reference_id"], "SLIP-9");
    assert_eq!(bodies[0]["gross_pay"], 1200);
}

#[tokio::test]
async fn test_generic_destination_uses_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "code": "1000", "name": "Cash", "type": "asset" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/accounts"))
        .and(header("authorization", "Basic YWxpY2U6czNjcmV0"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    for empty in ["/api/journal-entries", "/api/expense-claims", "/api/purchase-orders"] {
        Mock::given(method("GET"))
            .and(path(empty))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;
    }

    let mut config = IntegrationConfig::for_testing(&server.uri());
    config.frappe.enabled = false;
    config.generic.enabled = true;
    config.generic.auth_type = "basic".to_string();
    config.generic.username = "alice".to_string();
    config.generic.password = "s3cret".to_string();

    let (pipeline, sink) = pipeline();
    let outcome = pipeline
        .run(run_job(EntityType::Accounting, &config), Arc::new(config))
        .await;

    assert_eq!(outcome.outcome, RunOutcome::Succeeded);
    assert_eq!(outcome.dispatched, 1);
    assert!(sink.entries().await.is_empty());
    let bodies = received_json(&server, "POST", "/api/accounts").await;
    assert_eq!(bodies[0]["account_number"], "1000");
    assert_eq!(bodies[0]["account_name"], "Cash");
}
