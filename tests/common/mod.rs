//! Shared test utilities for the pipeline, engine and gateway tests.
//!
//! This module provides:
//! - A scripted `HttpTransport` that records every request
//! - Recording notifier, token refresher and in-memory dead-letter sink
//! - A `Harness` wiring them into a `SyncPipeline`
//! - HR record builders

#![allow(dead_code)]

pub mod mock_transport;

pub use mock_transport::*;

use integration_engine::classifier::{ErrorHandler, HandlerWaits};
use integration_engine::config::IntegrationConfig;
use integration_engine::coordinator::StatusRegistry;
use integration_engine::model::{EntityType, SyncJob, TriggerSource};
use integration_engine::pipeline::SyncPipeline;
use serde_json::{json, Value};
use std::sync::Arc;

pub const BASE: &str = "http://mock";

pub fn source_url(path: &str) -> String {
    format!("{BASE}/api/{path}")
}

pub fn primary_url(doctype: &str) -> String {
    format!("{BASE}/api/resource/{}", doctype.replace(' ', "%20"))
}

/// Config pointing source and primary ERP at the mock, with fast waits.
pub fn test_config() -> IntegrationConfig {
    IntegrationConfig::for_testing(BASE)
}

/// Everything a pipeline test needs to inspect afterwards.
pub struct Harness {
    pub transport: Arc<MockTransport>,
    pub notifier: Arc<RecordingNotifier>,
    pub refresher: Arc<RecordingRefresher>,
    pub dead_letters: Arc<MemoryDeadLetterSink>,
    pub status: Arc<StatusRegistry>,
    pub pipeline: SyncPipeline<MockTransport>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_transport(MockTransport::new())
    }

    pub fn with_transport(transport: MockTransport) -> Self {
        let transport = Arc::new(transport);
        let notifier = Arc::new(RecordingNotifier::default());
        let refresher = Arc::new(RecordingRefresher::default());
        let dead_letters = Arc::new(MemoryDeadLetterSink::default());
        let status = Arc::new(StatusRegistry::new());

        let handler = ErrorHandler::new(notifier.clone(), refresher.clone(), HandlerWaits::default());
        let pipeline = SyncPipeline::new(
            Arc::clone(&transport),
            handler,
            dead_letters.clone(),
            Arc::clone(&status),
        );

        Self {
            transport,
            notifier,
            refresher,
            dead_letters,
            status,
            pipeline,
        }
    }

    /// An error handler sharing this harness' recorders.
    pub fn handler(&self) -> ErrorHandler {
        self.pipeline.handler().clone()
    }
}

pub fn job(entity: EntityType, config: &IntegrationConfig) -> SyncJob {
    SyncJob::new(entity, TriggerSource::Manual, config.sync.schedule(entity).batch_size)
}

/// A source-side employee.
pub fn employee(id: &str) -> Value {
    json!({
        "employee_id": id,
        "full_name": format!("Employee {id}"),
        "first_name": "Test",
        "last_name": id,
        "email": format!("{}@example.com", id.to_lowercase()),
        "department": "Engineering",
        "hire_date": "2024-03-01T09:00:00Z",
        "status": "active",
        "salary": "4200.50"
    })
}

pub fn employees(count: usize) -> Vec<Value> {
    (1..=count).map(|i| employee(&format!("EMP{i:03}"))).collect()
}

/// A source-side salary slip.
pub fn salary_slip(id: &str) -> Value {
    json!({
        "id": id,
        "employee_id": "EMP001",
        "employee_name": "Employee EMP001",
        "pay_period": "2025-01-31",
        "gross_pay": 5000,
        "net_pay": 4100,
        "status": "approved"
    })
}

pub fn account(code: &str) -> Value {
    json!({ "code": code, "name": format!("Account {code}"), "type": "asset", "is_active": true })
}

pub fn data(records: Vec<Value>) -> Value {
    json!({ "data": records })
}
