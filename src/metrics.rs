// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Pipeline invocations and their outcomes
//! - Records fetched and dispatch calls per destination
//! - Classified errors
//! - Redelivery attempts and dead letters
//! - Engine state
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `integration_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration)
//!
//! # Usage
//!
//! ```rust,no_run
//! use integration_engine::metrics;
//! use integration_engine::model::EntityType;
//! use std::time::Duration;
//!
//! metrics::record_records_fetched(EntityType::Employee, "Employee", 42);
//! metrics::record_invocation(EntityType::Employee, "succeeded", Duration::from_secs(3));
//! ```

use crate::classifier::ErrorKind;
use crate::destination::DestinationKind;
use crate::model::EntityType;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

// =============================================================================
// Pipeline
// =============================================================================

/// Record a finished invocation.
pub fn record_invocation(entity: EntityType, outcome: &str, duration: Duration) {
    counter!(
        "integration_invocations_total",
        "entity" => entity.as_str(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("integration_invocation_duration_seconds", "entity" => entity.as_str())
        .record(duration.as_secs_f64());
}

/// Record an invocation skipped because another one held the entity.
pub fn record_invocation_skipped(entity: EntityType) {
    counter!("integration_invocations_skipped_total", "entity" => entity.as_str()).increment(1);
}

/// Record records read from the source.
pub fn record_records_fetched(entity: EntityType, document: &str, count: usize) {
    counter!(
        "integration_records_fetched_total",
        "entity" => entity.as_str(),
        "document" => document.to_string()
    )
    .increment(count as u64);
}

/// Record one dispatch call to a destination.
pub fn record_dispatch(destination: DestinationKind, document: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "integration_dispatch_total",
        "destination" => destination.to_string(),
        "document" => document.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("integration_dispatch_duration_seconds", "destination" => destination.to_string())
        .record(duration.as_secs_f64());
}

/// Record a redelivery of a failed invocation.
pub fn record_redelivery(entity: EntityType, attempt: u32) {
    counter!("integration_redeliveries_total", "entity" => entity.as_str()).increment(1);
    gauge!("integration_last_redelivery_attempt", "entity" => entity.as_str()).set(attempt as f64);
}

/// Record records written back to the source by reverse sync.
pub fn record_reverse_sync(entity: EntityType, count: usize, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("integration_reverse_sync_total", "entity" => entity.as_str(), "status" => status)
        .increment(1);
    if success {
        counter!("integration_reverse_records_total", "entity" => entity.as_str())
            .increment(count as u64);
    }
}

// =============================================================================
// Errors and dead letters
// =============================================================================

/// Record a classified error.
pub fn record_error(entity: EntityType, kind: ErrorKind) {
    counter!(
        "integration_errors_total",
        "entity" => entity.as_str(),
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a dead letter written.
pub fn record_dead_letter(entity: EntityType) {
    counter!("integration_dead_letters_total", "entity" => entity.as_str()).increment(1);
}

// =============================================================================
// Engine
// =============================================================================

/// Gauge for engine state.
pub fn set_engine_state(state: &str) {
    // 0=created, 1=running, 2=shutting down, 3=stopped
    let value = match state {
        "Created" => 0.0,
        "Running" => 1.0,
        "ShuttingDown" => 2.0,
        "Stopped" => 3.0,
        _ => -1.0,
    };
    gauge!("integration_engine_state").set(value);
}

/// Gauge of invocations currently running for an entity.
pub fn set_running_invocations(entity: EntityType, count: usize) {
    gauge!("integration_running_invocations", "entity" => entity.as_str()).set(count as f64);
}

/// Record a scheduler tick and whether it started an invocation.
pub fn record_scheduler_tick(entity: EntityType, fired: bool) {
    let result = if fired { "fired" } else { "disabled" };
    counter!("integration_scheduler_ticks_total", "entity" => entity.as_str(), "result" => result)
        .increment(1);
}
