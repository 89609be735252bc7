// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Trigger Gateway: the HTTP control plane.
//!
//! Triggers answer as soon as the job is spawned and never report its
//! outcome; failures show up only in logs, operator notices and dead
//! letters. Status routes read the live [`StatusRegistry`](crate::coordinator::StatusRegistry).
//!
//! ```text
//! POST /{entity}/sync           → {"status":"triggered","message":"Employee sync started"}
//! POST /{entity}/reverse-sync   → {"status":"triggered","message":"Employee reverse sync started"}
//! GET  /{entity}/status         → live per-entity status
//! GET  /integration/status      → engine state, uptime, enabled flags
//! GET  /health                  → {"status":"UP","service":"integration-service"}
//! ```
//!
//! `{entity}` is one of `employee`, `payroll`, `accounting`, `leave`.

use crate::coordinator::{EngineState, IntegrationEngine};
use crate::error::IntegrationError;
use crate::model::{EntityType, TriggerSource};
use crate::transport::HttpTransport;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Build the gateway router around a shared engine.
pub fn router<T: HttpTransport>(engine: Arc<IntegrationEngine<T>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/integration/status", get(integration_status::<T>))
        .route("/:entity/sync", post(trigger_sync::<T>))
        .route("/:entity/reverse-sync", post(trigger_reverse_sync::<T>))
        .route("/:entity/status", get(entity_status::<T>))
        .with_state(engine)
}

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "status": "error", "message": message.into() })),
    )
        .into_response()
}

fn parse_entity(segment: &str) -> Result<EntityType, Response> {
    EntityType::parse(segment)
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, format!("unknown integration: {segment}")))
}

fn unavailable(error: IntegrationError) -> Response {
    warn!(error = %error, "Trigger rejected");
    json_error(StatusCode::SERVICE_UNAVAILABLE, error.to_string())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "UP", "service": "integration-service" }))
}

async fn trigger_sync<T: HttpTransport>(
    State(engine): State<Arc<IntegrationEngine<T>>>,
    Path(segment): Path<String>,
) -> Response {
    let entity = match parse_entity(&segment) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    match engine.trigger(entity, TriggerSource::Manual).await {
        Ok(launch) => {
            info!(entity = %entity, launch = ?launch, "Manual sync triggered");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "triggered",
                    "message": format!("{} sync started", entity.display_name()),
                })),
            )
                .into_response()
        }
        Err(e) => unavailable(e),
    }
}

async fn trigger_reverse_sync<T: HttpTransport>(
    State(engine): State<Arc<IntegrationEngine<T>>>,
    Path(segment): Path<String>,
) -> Response {
    let entity = match parse_entity(&segment) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    match engine.trigger_reverse(entity).await {
        Ok(job_id) => {
            info!(entity = %entity, job_id = %job_id, "Reverse sync triggered");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "triggered",
                    "message": format!("{} reverse sync started", entity.display_name()),
                })),
            )
                .into_response()
        }
        Err(e) => unavailable(e),
    }
}

fn active_label(enabled: bool) -> &'static str {
    if enabled {
        "active"
    } else {
        "disabled"
    }
}

async fn entity_status<T: HttpTransport>(
    State(engine): State<Arc<IntegrationEngine<T>>>,
    Path(segment): Path<String>,
) -> Response {
    let entity = match parse_entity(&segment) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let enabled = engine.config().sync.schedule(entity).enabled;
    let status = engine.status().get(entity).await;

    (
        StatusCode::OK,
        Json(json!({
            "status": active_label(enabled),
            "state": status.state,
            "lastSync": status.last_finished.map(|t| t.to_rfc3339()),
            "lastOutcome": status.last_outcome,
            "running": status.running,
            "runs": status.runs,
            "failures": status.failures,
        })),
    )
        .into_response()
}

async fn integration_status<T: HttpTransport>(
    State(engine): State<Arc<IntegrationEngine<T>>>,
) -> Json<Value> {
    let config = engine.config();
    let integrations: Map<String, Value> = EntityType::ALL
        .into_iter()
        .map(|e| {
            let label = active_label(config.sync.schedule(e).enabled);
            (e.as_str().to_string(), Value::from(label))
        })
        .collect();

    let state = match engine.state() {
        EngineState::Running => "running".to_string(),
        other => other.to_string().to_lowercase(),
    };
    let uptime = Duration::from_secs(engine.uptime().as_secs());

    Json(json!({
        "status": state,
        "uptime": humantime::format_duration(uptime).to_string(),
        "integrations": integrations,
    }))
}
