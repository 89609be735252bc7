//! Engine and pipeline state types.
//!
//! Defines the state machine for the engine lifecycle and the live,
//! per-entity status the trigger gateway reports.
//!
//! # Engine State Transitions
//!
//! ```text
//!                  start()
//! Created ───────────────────→ Running
//!    │                            │
//!    │ shutdown()                 │ shutdown()
//!    ↓                            ↓
//! Stopped ←───────────────── ShuttingDown
//! ```
//!
//! # Pipeline State Transitions
//!
//! ```text
//! Idle → Fetching → Transforming → Dispatching ─┬→ Succeeded
//!           ↑                          │        └→ Failed
//!           └──────(next document)─────┘
//! ```
//!
//! A redelivered attempt re-enters `Fetching` (or `Dispatching` when every
//! remaining document is already fetched).

use crate::model::{EntityType, TriggerSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tokio::sync::RwLock;

/// State of the integration engine.
///
/// See module docs for the state transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Engine created but not started.
    ///
    /// Call [`start()`](super::IntegrationEngine::start) to register timers.
    /// Manual triggers are already accepted in this state.
    Created,

    /// Timers are running.
    Running,

    /// `shutdown()` called. Timers are being stopped.
    ShuttingDown,

    /// Timers stopped. Invocations already running finish on their own.
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Created => write!(f, "Created"),
            EngineState::Running => write!(f, "Running"),
            EngineState::ShuttingDown => write!(f, "ShuttingDown"),
            EngineState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Where an entity's most recent invocation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Fetching,
    Transforming,
    Dispatching,
    Succeeded,
    Failed,
}

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    /// Redelivery exhausted but the dead letters could not all be written.
    Failed,
    DeadLettered,
    /// Not run because another invocation held the entity.
    Skipped,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Succeeded => "succeeded",
            RunOutcome::Failed => "failed",
            RunOutcome::DeadLettered => "dead_lettered",
            RunOutcome::Skipped => "skipped",
        }
    }
}

/// Live status of one entity type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStatus {
    pub state: PipelineState,
    pub last_trigger: Option<TriggerSource>,
    pub last_started: Option<DateTime<Utc>>,
    pub last_finished: Option<DateTime<Utc>>,
    pub last_outcome: Option<RunOutcome>,
    pub runs: u64,
    pub failures: u64,
    /// Invocations in flight right now.
    pub running: usize,
}

impl Default for EntityStatus {
    fn default() -> Self {
        Self {
            state: PipelineState::Idle,
            last_trigger: None,
            last_started: None,
            last_finished: None,
            last_outcome: None,
            runs: 0,
            failures: 0,
            running: 0,
        }
    }
}

/// Per-entity status shared by the engine, its pipelines and the gateway.
#[derive(Debug)]
pub struct StatusRegistry {
    entries: RwLock<HashMap<EntityType, EntityStatus>>,
}

impl Default for StatusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusRegistry {
    pub fn new() -> Self {
        let entries = EntityType::ALL
            .into_iter()
            .map(|e| (e, EntityStatus::default()))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Record an invocation starting. Returns the number now in flight.
    pub async fn begin(&self, entity: EntityType, trigger: TriggerSource) -> usize {
        let mut entries = self.entries.write().await;
        let status = entries.entry(entity).or_default();
        status.runs += 1;
        status.running += 1;
        status.last_trigger = Some(trigger);
        status.last_started = Some(Utc::now());
        status.state = PipelineState::Idle;
        status.running
    }

    pub async fn set_state(&self, entity: EntityType, state: PipelineState) {
        self.entries.write().await.entry(entity).or_default().state = state;
    }

    /// Record an invocation ending. Returns the number still in flight.
    pub async fn finish(&self, entity: EntityType, outcome: RunOutcome) -> usize {
        let mut entries = self.entries.write().await;
        let status = entries.entry(entity).or_default();
        status.running = status.running.saturating_sub(1);
        status.last_finished = Some(Utc::now());
        status.last_outcome = Some(outcome);
        status.state = match outcome {
            RunOutcome::Succeeded => PipelineState::Succeeded,
            _ => PipelineState::Failed,
        };
        if matches!(outcome, RunOutcome::Failed | RunOutcome::DeadLettered) {
            status.failures += 1;
        }
        status.running
    }

    /// Record an invocation that was not run.
    pub async fn skipped(&self, entity: EntityType, trigger: TriggerSource) {
        let mut entries = self.entries.write().await;
        let status = entries.entry(entity).or_default();
        status.last_trigger = Some(trigger);
        status.last_outcome = Some(RunOutcome::Skipped);
    }

    pub async fn get(&self, entity: EntityType) -> EntityStatus {
        self.entries
            .read()
            .await
            .get(&entity)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn snapshot(&self) -> BTreeMap<EntityType, EntityStatus> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(e, s)| (*e, s.clone()))
            .collect()
    }
}
