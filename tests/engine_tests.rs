// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine lifecycle tests: triggers, single-flight and timers.
//!
//! Run on a paused clock so timer periods of seconds cost nothing.

mod common;

use common::*;
use integration_engine::classifier::{ErrorHandler, HandlerWaits};
use integration_engine::config::IntegrationConfig;
use integration_engine::coordinator::{EngineState, IntegrationEngine, Launch, RunOutcome};
use integration_engine::model::{EntityType, TriggerSource};
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

struct TestEngine {
    config_tx: watch::Sender<IntegrationConfig>,
    transport: Arc<MockTransport>,
    engine: Arc<IntegrationEngine<MockTransport>>,
}

async fn engine_with(config: IntegrationConfig, transport: MockTransport) -> TestEngine {
    let transport = Arc::new(transport);
    transport
        .on(Method::GET, &source_url("employees"), [Reply::ok(data(vec![]))])
        .await;

    let (config_tx, config_rx) = watch::channel(config);
    let handler = ErrorHandler::new(
        Arc::new(RecordingNotifier::default()),
        Arc::new(RecordingRefresher::default()),
        HandlerWaits::default(),
    );
    let engine = IntegrationEngine::with_parts(
        config_rx,
        Arc::clone(&transport),
        handler,
        Arc::new(MemoryDeadLetterSink::default()),
    );

    TestEngine {
        config_tx,
        transport,
        engine: Arc::new(engine),
    }
}

/// Only employee sync enabled, first tick after 1s then every 10s.
fn employee_only() -> IntegrationConfig {
    let mut config = test_config();
    config.sync.employee.initial_delay = Some("1s".to_string());
    config.sync.employee.period = Some("10s".to_string());
    for entity in [EntityType::Payroll, EntityType::Accounting, EntityType::Leave] {
        config.sync.get_mut(entity).enabled = Some(false);
    }
    config
}

async fn employee_fetches(t: &TestEngine) -> usize {
    t.transport
        .requests_to(Method::GET, &source_url("employees"))
        .await
        .len()
}

// =============================================================================
// Triggers
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_manual_trigger_runs_job_in_background() {
    let t = engine_with(test_config(), MockTransport::new()).await;

    let launch = t
        .engine
        .trigger(EntityType::Employee, TriggerSource::Manual)
        .await
        .unwrap();
    assert!(matches!(launch, Launch::Started(_)));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(employee_fetches(&t).await, 1);

    let status = t.engine.status().get(EntityType::Employee).await;
    assert_eq!(status.last_outcome, Some(RunOutcome::Succeeded));
    assert_eq!(status.last_trigger, Some(TriggerSource::Manual));
}

#[tokio::test(start_paused = true)]
async fn test_single_flight_skips_overlapping_invocation() {
    let mut config = test_config();
    config.sync.single_flight = true;
    let t = engine_with(config, MockTransport::with_delay(Duration::from_secs(1))).await;

    let first = t
        .engine
        .trigger(EntityType::Employee, TriggerSource::Manual)
        .await
        .unwrap();
    let second = t
        .engine
        .trigger(EntityType::Employee, TriggerSource::Manual)
        .await
        .unwrap();
    assert!(matches!(first, Launch::Started(_)));
    assert_eq!(second, Launch::Skipped);

    // Other entities are not blocked.
    let payroll = t
        .engine
        .trigger(EntityType::Payroll, TriggerSource::Manual)
        .await
        .unwrap();
    assert!(matches!(payroll, Launch::Started(_)));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(employee_fetches(&t).await, 1);

    let third = t
        .engine
        .trigger(EntityType::Employee, TriggerSource::Manual)
        .await
        .unwrap();
    assert!(matches!(third, Launch::Started(_)));
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_invocations_run_without_single_flight() {
    let t = engine_with(test_config(), MockTransport::with_delay(Duration::from_secs(1))).await;

    for _ in 0..2 {
        let launch = t
            .engine
            .trigger(EntityType::Employee, TriggerSource::Manual)
            .await
            .unwrap();
        assert!(matches!(launch, Launch::Started(_)));
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(t.engine.status().get(EntityType::Employee).await.running, 2);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(employee_fetches(&t).await, 2);
    let status = t.engine.status().get(EntityType::Employee).await;
    assert_eq!(status.running, 0);
    assert_eq!(status.runs, 2);
}

#[tokio::test(start_paused = true)]
async fn test_reverse_trigger_returns_job_id() {
    let t = engine_with(test_config(), MockTransport::new()).await;
    t.transport
        .on(Method::GET, &primary_url("Leave Application"), [Reply::ok(data(vec![]))])
        .await;

    let job_id = t.engine.trigger_reverse(EntityType::Leave).await.unwrap();
    assert_eq!(job_id.get_version_num(), 7);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let reads = t
        .transport
        .requests_to(Method::GET, &primary_url("Leave Application"))
        .await;
    assert_eq!(reads.len(), 1);
}

// =============================================================================
// Timers
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_timer_fires_after_initial_delay_then_every_period() {
    let t = engine_with(employee_only(), MockTransport::new()).await;
    t.engine.start().await.unwrap();
    assert_eq!(t.engine.state(), EngineState::Running);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(employee_fetches(&t).await, 0);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(employee_fetches(&t).await, 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(employee_fetches(&t).await, 2);

    let status = t.engine.status().get(EntityType::Employee).await;
    assert_eq!(status.last_trigger, Some(TriggerSource::Scheduled));

    t.engine.shutdown().await;
    assert_eq!(t.engine.state(), EngineState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_disabling_entity_skips_later_ticks() {
    let t = engine_with(employee_only(), MockTransport::new()).await;
    t.engine.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(employee_fetches(&t).await, 1);

    t.config_tx
        .send_modify(|c| c.sync.employee.enabled = Some(false));
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(employee_fetches(&t).await, 1);

    t.config_tx
        .send_modify(|c| c.sync.employee.enabled = Some(true));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(employee_fetches(&t).await, 2);

    t.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_timers_and_rejects_triggers() {
    let t = engine_with(employee_only(), MockTransport::new()).await;
    t.engine.start().await.unwrap();
    t.engine.shutdown().await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(employee_fetches(&t).await, 0);

    assert!(t
        .engine
        .trigger(EntityType::Employee, TriggerSource::Manual)
        .await
        .is_err());
}
