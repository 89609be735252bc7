// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Integration engine coordinator.
//!
//! The main orchestrator that ties together:
//! - Per-entity timers (see `scheduler`)
//! - Manual and reverse triggers from the [gateway](crate::gateway)
//! - The [`SyncPipeline`] that runs each job
//! - The live [`StatusRegistry`]
//!
//! # Architecture
//!
//! ```text
//!  timers ──┐
//!           ├──► Launcher ──tokio::spawn──► SyncPipeline::run(job, snapshot)
//! triggers ─┘       │
//!                   └── single-flight guard (optional)
//! ```
//!
//! Every invocation runs on its own task with its own config snapshot.
//! Shutdown stops the timers; invocations already running finish on their own.

mod scheduler;
mod types;

pub use types::{EngineState, EntityStatus, PipelineState, RunOutcome, StatusRegistry};

use crate::classifier::ErrorHandler;
use crate::config::IntegrationConfig;
use crate::dead_letter::{DeadLetterSink, FileDeadLetterSink};
use crate::error::{IntegrationError, Result};
use crate::metrics;
use crate::model::{EntityType, SyncJob, TriggerSource};
use crate::pipeline::SyncPipeline;
use crate::resilience::SingleFlight;
use crate::transport::{HttpTransport, ReqwestTransport};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What a trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    /// An invocation was spawned for this job.
    Started(Uuid),
    /// Another invocation of the same entity holds the single-flight slot.
    Skipped,
}

/// Spawns invocations. Shared by the timers and the engine.
pub(crate) struct Launcher<T: HttpTransport> {
    pipeline: SyncPipeline<T>,
    single_flight: Arc<SingleFlight>,
    config_rx: watch::Receiver<IntegrationConfig>,
}

impl<T: HttpTransport> Clone for Launcher<T> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            single_flight: Arc::clone(&self.single_flight),
            config_rx: self.config_rx.clone(),
        }
    }
}

impl<T: HttpTransport> Launcher<T> {
    /// Current config, frozen for one invocation.
    pub(crate) fn snapshot(&self) -> Arc<IntegrationConfig> {
        Arc::new(self.config_rx.borrow().clone())
    }

    pub(crate) async fn launch(
        &self,
        entity: EntityType,
        trigger: TriggerSource,
        config: Arc<IntegrationConfig>,
    ) -> Launch {
        let permit = if config.sync.single_flight {
            match self.single_flight.try_acquire(entity) {
                Some(permit) => Some(permit),
                None => {
                    info!(entity = %entity, trigger = %trigger, "Previous invocation still running, skipped");
                    metrics::record_invocation_skipped(entity);
                    self.pipeline.status().skipped(entity, trigger).await;
                    return Launch::Skipped;
                }
            }
        } else {
            None
        };

        let job = SyncJob::new(entity, trigger, config.sync.schedule(entity).batch_size);
        let job_id = job.id;
        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            let _permit = permit;
            pipeline.run(job, config).await;
        });
        debug!(entity = %entity, job_id = %job_id, trigger = %trigger, "Invocation spawned");
        Launch::Started(job_id)
    }
}

/// The integration engine.
///
/// Owns the timers and launches sync jobs. Shareable behind an `Arc`;
/// every method takes `&self`.
pub struct IntegrationEngine<T: HttpTransport = ReqwestTransport> {
    launcher: Launcher<T>,

    /// Engine state (broadcast to watchers)
    state_tx: watch::Sender<EngineState>,
    state_rx: watch::Receiver<EngineState>,

    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,

    /// Timer task handles
    handles: RwLock<Vec<tokio::task::JoinHandle<()>>>,

    created_at: Instant,
}

impl IntegrationEngine<ReqwestTransport> {
    /// Engine with the reqwest transport, log notifier and file dead letters
    /// under `errorDirectory`.
    pub fn new(config_rx: watch::Receiver<IntegrationConfig>) -> Self {
        let error_directory = config_rx.borrow().error_directory.clone();
        Self::with_parts(
            config_rx,
            Arc::new(ReqwestTransport::new()),
            ErrorHandler::default(),
            Arc::new(FileDeadLetterSink::new(error_directory)),
        )
    }
}

impl<T: HttpTransport> IntegrationEngine<T> {
    /// Engine with explicit collaborators.
    pub fn with_parts(
        config_rx: watch::Receiver<IntegrationConfig>,
        transport: Arc<T>,
        handler: ErrorHandler,
        dead_letters: Arc<dyn DeadLetterSink>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(EngineState::Created);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let status = Arc::new(StatusRegistry::new());

        Self {
            launcher: Launcher {
                pipeline: SyncPipeline::new(transport, handler, dead_letters, status),
                single_flight: Arc::new(SingleFlight::new()),
                config_rx,
            },
            state_tx,
            state_rx,
            shutdown_tx,
            shutdown_rx,
            handles: RwLock::new(Vec::new()),
            created_at: Instant::now(),
        }
    }

    /// Get current engine state.
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), EngineState::Running)
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Arc<IntegrationConfig> {
        self.launcher.snapshot()
    }

    pub fn status(&self) -> &Arc<StatusRegistry> {
        self.launcher.pipeline.status()
    }

    pub fn pipeline(&self) -> &SyncPipeline<T> {
        &self.launcher.pipeline
    }

    /// Time since the engine was created.
    pub fn uptime(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Register one timer per entity type.
    pub async fn start(&self) -> Result<()> {
        if self.state() != EngineState::Created {
            return Err(IntegrationError::InvalidState {
                expected: "Created".to_string(),
                actual: self.state().to_string(),
            });
        }

        info!(entities = EntityType::ALL.len(), "Starting integration engine");

        let mut handles = self.handles.write().await;
        for entity in EntityType::ALL {
            let launcher = self.launcher.clone();
            let shutdown_rx = self.shutdown_rx.clone();
            handles.push(tokio::spawn(async move {
                scheduler::run_timer(entity, launcher, shutdown_rx).await;
            }));
        }

        let _ = self.state_tx.send(EngineState::Running);
        metrics::set_engine_state("Running");
        info!("Integration engine running");
        Ok(())
    }

    fn ensure_accepting(&self) -> Result<()> {
        match self.state() {
            EngineState::Created | EngineState::Running => Ok(()),
            EngineState::ShuttingDown | EngineState::Stopped => Err(IntegrationError::Shutdown),
        }
    }

    /// Launch a sync job for `entity` and return immediately.
    pub async fn trigger(&self, entity: EntityType, trigger: TriggerSource) -> Result<Launch> {
        self.ensure_accepting()?;
        let config = self.launcher.snapshot();
        Ok(self.launcher.launch(entity, trigger, config).await)
    }

    /// Launch a reverse sync for `entity` and return its job id immediately.
    pub async fn trigger_reverse(&self, entity: EntityType) -> Result<Uuid> {
        self.ensure_accepting()?;
        let config = self.launcher.snapshot();
        let job = SyncJob::new(entity, TriggerSource::Manual, config.sync.schedule(entity).batch_size);
        let job_id = job.id;
        let pipeline = self.launcher.pipeline.clone();
        tokio::spawn(async move {
            pipeline.run_reverse(job, config).await;
        });
        debug!(entity = %entity, job_id = %job_id, "Reverse sync spawned");
        Ok(job_id)
    }

    /// Stop the timers.
    ///
    /// Invocations already running are not cancelled.
    pub async fn shutdown(&self) {
        info!("Shutting down integration engine");
        let _ = self.state_tx.send(EngineState::ShuttingDown);
        metrics::set_engine_state("ShuttingDown");

        let _ = self.shutdown_tx.send(true);

        let handles: Vec<_> = {
            let mut guard = self.handles.write().await;
            std::mem::take(&mut *guard)
        };

        let drain_timeout = Duration::from_secs(5);
        match tokio::time::timeout(drain_timeout, join_all(handles)).await {
            Ok(results) => {
                for (i, result) in results.into_iter().enumerate() {
                    match result {
                        Ok(()) => debug!(task = i + 1, "Timer completed"),
                        Err(e) => warn!(task = i + 1, error = %e, "Timer panicked during shutdown"),
                    }
                }
            }
            Err(_) => warn!(timeout_secs = drain_timeout.as_secs(), "Timers did not stop in time"),
        }

        let _ = self.state_tx.send(EngineState::Stopped);
        metrics::set_engine_state("Stopped");
        info!("Integration engine stopped");
    }
}
