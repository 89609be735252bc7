// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync Pipeline: fetch → transform → route → dispatch, with redelivery.
//!
//! One [`SyncPipeline::run`] call executes one [`SyncJob`] to a terminal
//! outcome. The job walks its entity's document kinds in order:
//!
//! ```text
//!  ┌───────────┐   ┌──────────────┐   ┌─────────────┐
//!  │ FETCHING  │──►│ TRANSFORMING │──►│ DISPATCHING │──► next document
//!  └───────────┘   └──────────────┘   └─────────────┘
//!        │ fetch/transform failure           │ unit failure
//!        ▼                                   ▼
//!   abort remaining documents          sibling units still sent
//! ```
//!
//! # Dispatch units
//!
//! - **Combined** (employee): one unit per destination carrying
//!   `{"employees": [...]}`. A failed call fails that destination's whole batch.
//! - **PerItem** (everything else): one unit per record and destination.
//!   A failed record does not stop its siblings.
//!
//! # Redelivery
//!
//! Any failure fails the attempt. The job is retried under
//! [`RedeliveryPolicy`]: the next attempt resumes where this one stopped,
//! re-sending only the units that failed and fetching only the documents
//! that were never fetched. A destination that accepted a unit is never
//! sent it again by the same job.
//!
//! When attempts run out, every unresolved failure is written to the
//! [`DeadLetterSink`] and one operator notice summarises the job.

use crate::classifier::{ErrorEvent, ErrorHandler, HandlerWaits, OperatorNotice};
use crate::config::IntegrationConfig;
use crate::coordinator::{PipelineState, RunOutcome, StatusRegistry};
use crate::dead_letter::{DeadLetterEntry, DeadLetterSink};
use crate::destination::{select_destinations, DestinationKind};
use crate::error::IntegrationError;
use crate::metrics;
use crate::model::{DispatchMode, DocumentKind, SyncJob, SyncRecord};
use crate::resilience::RedeliveryPolicy;
use crate::source::SourceClient;
use crate::transform::{record_id, to_sync_record, Direction};
use crate::transport::{HttpTransport, OutboundRequest};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Result of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub job_id: Uuid,
    pub outcome: RunOutcome,
    /// Attempts made, first one included.
    pub attempts: u32,
    /// Units accepted by a destination.
    pub dispatched: usize,
    /// Dead letters written on exhaustion.
    pub dead_letters: usize,
}

/// A single call to a single destination.
#[derive(Debug, Clone)]
struct DispatchUnit {
    destination: DestinationKind,
    record_id: Option<String>,
    request: OutboundRequest,
}

impl DispatchUnit {
    fn payload(&self) -> Value {
        self.request.body.clone().unwrap_or(Value::Null)
    }
}

#[derive(Debug)]
enum DocumentProgress {
    NotFetched,
    Pending(Vec<DispatchUnit>),
    Done,
}

/// A failure seen during an attempt, with the payload to dead-letter.
#[derive(Debug)]
struct Failure {
    event: ErrorEvent,
    payload: Value,
}

/// Per-job bookkeeping carried across attempts.
struct JobRun<'a> {
    job: &'a SyncJob,
    config: &'a IntegrationConfig,
    source: SourceClient,
    handler: ErrorHandler,
    progress: Vec<(DocumentKind, DocumentProgress)>,
    dispatched: usize,
}

/// Executes sync jobs against a transport.
pub struct SyncPipeline<T: HttpTransport> {
    transport: Arc<T>,
    handler: ErrorHandler,
    dead_letters: Arc<dyn DeadLetterSink>,
    status: Arc<StatusRegistry>,
}

impl<T: HttpTransport> Clone for SyncPipeline<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            handler: self.handler.clone(),
            dead_letters: Arc::clone(&self.dead_letters),
            status: Arc::clone(&self.status),
        }
    }
}

impl<T: HttpTransport> SyncPipeline<T> {
    pub fn new(
        transport: Arc<T>,
        handler: ErrorHandler,
        dead_letters: Arc<dyn DeadLetterSink>,
        status: Arc<StatusRegistry>,
    ) -> Self {
        Self {
            transport,
            handler,
            dead_letters,
            status,
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn handler(&self) -> &ErrorHandler {
        &self.handler
    }

    pub fn status(&self) -> &Arc<StatusRegistry> {
        &self.status
    }

    /// Run `job` to a terminal outcome using the `config` snapshot.
    ///
    /// Never returns an error: every failure is classified, handled and,
    /// once redelivery is exhausted, dead-lettered.
    pub async fn run(&self, job: SyncJob, config: Arc<IntegrationConfig>) -> SyncOutcome {
        let span = info_span!(
            "sync",
            entity = %job.entity,
            job_id = %job.id,
            trigger = %job.trigger
        );
        self.run_job(&job, &config).instrument(span).await
    }

    async fn run_job(&self, job: &SyncJob, config: &IntegrationConfig) -> SyncOutcome {
        let started = Instant::now();
        let policy = RedeliveryPolicy::from_config(config);
        self.status.begin(job.entity, job.trigger).await;
        metrics::set_running_invocations(job.entity, self.status.get(job.entity).await.running);

        info!(batch_size = job.batch_size, max_attempts = policy.max_attempts, "Sync started");

        let mut run = JobRun {
            job,
            config,
            source: SourceClient::from_config(config),
            handler: self.handler.with_waits(HandlerWaits::from_config(config)),
            progress: job
                .entity
                .documents()
                .iter()
                .map(|d| (*d, DocumentProgress::NotFetched))
                .collect(),
            dispatched: 0,
        };

        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            let failures = self.run_attempt(&mut run, attempt).await;

            if failures.is_empty() {
                self.status.set_state(job.entity, PipelineState::Succeeded).await;
                info!(attempt, dispatched = run.dispatched, "Sync completed");
                break SyncOutcome {
                    job_id: job.id,
                    outcome: RunOutcome::Succeeded,
                    attempts: attempt,
                    dispatched: run.dispatched,
                    dead_letters: 0,
                };
            }

            self.status.set_state(job.entity, PipelineState::Failed).await;

            if !policy.should_retry(attempt) {
                error!(
                    attempts = attempt,
                    failures = failures.len(),
                    "Redelivery exhausted, writing dead letters"
                );
                let (written, outcome) = self.exhaust(job, attempt, failures).await;
                break SyncOutcome {
                    job_id: job.id,
                    outcome,
                    attempts: attempt,
                    dispatched: run.dispatched,
                    dead_letters: written,
                };
            }

            let delay = policy.delay_for_attempt(attempt);
            warn!(
                attempt,
                failures = failures.len(),
                next_attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Sync attempt failed, redelivering"
            );
            metrics::record_redelivery(job.entity, attempt + 1);
            tokio::time::sleep(delay).await;
        };

        let running = self.status.finish(job.entity, outcome.outcome).await;
        metrics::set_running_invocations(job.entity, running);
        metrics::record_invocation(job.entity, outcome.outcome.as_str(), started.elapsed());
        outcome
    }

    /// One pass over the job's outstanding work. Returns this attempt's failures.
    async fn run_attempt(&self, run: &mut JobRun<'_>, attempt: u32) -> Vec<Failure> {
        let job = run.job;
        let mut failures = Vec::new();
        debug!(attempt, "Starting attempt");

        for index in 0..run.progress.len() {
            let document = run.progress[index].0;
            let progress = std::mem::replace(&mut run.progress[index].1, DocumentProgress::Done);

            let units = match progress {
                DocumentProgress::Done => continue,
                DocumentProgress::Pending(units) => units,
                DocumentProgress::NotFetched => {
                    match self.prepare(run, document, attempt, &mut failures).await {
                        Some(units) => units,
                        None => {
                            // Aborted: this and every later document is fetched next attempt.
                            run.progress[index].1 = DocumentProgress::NotFetched;
                            break;
                        }
                    }
                }
            };

            self.status.set_state(job.entity, PipelineState::Dispatching).await;
            let remaining = self.dispatch(run, document, units, attempt, &mut failures).await;
            run.progress[index].1 = if remaining.is_empty() {
                DocumentProgress::Done
            } else {
                DocumentProgress::Pending(remaining)
            };
        }

        failures
    }

    /// Fetch, transform and route one document. `None` aborts the attempt.
    async fn prepare(
        &self,
        run: &JobRun<'_>,
        document: DocumentKind,
        attempt: u32,
        failures: &mut Vec<Failure>,
    ) -> Option<Vec<DispatchUnit>> {
        let job = run.job;

        self.status.set_state(job.entity, PipelineState::Fetching).await;
        let batch = match run
            .source
            .fetch(self.transport.as_ref(), document, job.batch_size)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                self.fail(run, failures, &e, attempt, document, None, None, Value::Null)
                    .await;
                return None;
            }
        };
        metrics::record_records_fetched(job.entity, document.doctype(), batch.records.len());
        debug!(document = %document, records = batch.records.len(), "Fetched");

        self.status.set_state(job.entity, PipelineState::Transforming).await;
        let mut records = Vec::with_capacity(batch.records.len());
        for raw in batch.records {
            match to_sync_record(document, raw.clone()) {
                Ok(record) => records.push(record),
                Err(e) => {
                    let err = IntegrationError::from(e);
                    let id = failed_record_id(document, &raw);
                    self.fail(run, failures, &err, attempt, document, None, id, raw)
                        .await;
                    return None;
                }
            }
        }

        Some(build_units(run.config, document, records))
    }

    /// Send every unit; return the ones that failed.
    async fn dispatch(
        &self,
        run: &mut JobRun<'_>,
        document: DocumentKind,
        units: Vec<DispatchUnit>,
        attempt: u32,
        failures: &mut Vec<Failure>,
    ) -> Vec<DispatchUnit> {
        let mut remaining = Vec::new();

        for unit in units {
            let started = Instant::now();
            let url = unit.request.url.clone();
            let result = match self.transport.send(unit.request.clone()).await {
                Ok(response) => response.error_for_status(&url).map(|_| ()),
                Err(e) => Err(e),
            };
            metrics::record_dispatch(unit.destination, document.doctype(), result.is_ok(), started.elapsed());

            match result {
                Ok(()) => {
                    run.dispatched += 1;
                    debug!(
                        document = %document,
                        destination = %unit.destination,
                        record_id = ?unit.record_id,
                        "Dispatched"
                    );
                }
                Err(e) => {
                    self.fail(
                        run,
                        failures,
                        &e,
                        attempt,
                        document,
                        Some(unit.destination),
                        unit.record_id.clone(),
                        unit.payload(),
                    )
                    .await;
                    remaining.push(unit);
                }
            }
        }

        remaining
    }

    /// Classify, handle and record one failure.
    #[allow(clippy::too_many_arguments)]
    async fn fail(
        &self,
        run: &JobRun<'_>,
        failures: &mut Vec<Failure>,
        error: &IntegrationError,
        attempt: u32,
        document: DocumentKind,
        destination: Option<DestinationKind>,
        record_id: Option<String>,
        payload: Value,
    ) {
        let mut event = ErrorEvent::from_error(run.job, error, attempt).with_document(document);
        if let Some(d) = destination {
            event = event.with_destination(d);
        }
        if let Some(id) = record_id {
            event = event.with_record(id);
        }
        run.handler.handle(&event).await;
        failures.push(Failure { event, payload });
    }

    /// Write dead letters for the final attempt's failures and notify once.
    async fn exhaust(
        &self,
        job: &SyncJob,
        attempts: u32,
        failures: Vec<Failure>,
    ) -> (usize, RunOutcome) {
        let total = failures.len();
        let mut written = 0;
        for failure in failures {
            match self
                .dead_letters
                .append(DeadLetterEntry::new(failure.payload, failure.event))
                .await
            {
                Ok(()) => written += 1,
                Err(e) => error!(error = %e, "Failed to write dead letter"),
            }
        }

        let notice = OperatorNotice {
            subject: format!(
                "{} sync failed after {} attempts",
                job.entity.display_name(),
                attempts
            ),
            message: format!(
                "{total} unresolved failure(s), {written} written to dead letters for manual recovery"
            ),
            entity: job.entity,
            job_id: job.id,
        };
        self.handler.send_notice(notice).await;

        let outcome = if written == total {
            RunOutcome::DeadLettered
        } else {
            RunOutcome::Failed
        };
        (written, outcome)
    }
}

/// Build dispatch units for `document` across the selected destinations.
/// Identifier of a record that failed to transform, coerced the same way the
/// transform coerces it. `None` when the identifier itself is unusable.
fn failed_record_id(document: DocumentKind, raw: &Value) -> Option<String> {
    record_id(document.schema(), raw, Direction::ToDestination).ok()
}

fn build_units(
    config: &IntegrationConfig,
    document: DocumentKind,
    records: Vec<SyncRecord>,
) -> Vec<DispatchUnit> {
    if records.is_empty() {
        debug!(document = %document, "Nothing to dispatch");
        return Vec::new();
    }

    let destinations = select_destinations(config, document);
    if destinations.is_empty() {
        warn!(document = %document, records = records.len(), "No enabled destination accepts this document");
        return Vec::new();
    }

    let mut units = Vec::new();
    match document.dispatch_mode() {
        DispatchMode::Combined => {
            let batch: Vec<Value> = records.iter().map(|r| r.transformed.clone()).collect();
            let body = json!({ document.envelope_key(): batch });
            for destination in &destinations {
                if let Some(request) = destination.create_request(document, body.clone()) {
                    units.push(DispatchUnit {
                        destination: destination.kind(),
                        record_id: None,
                        request,
                    });
                }
            }
        }
        DispatchMode::PerItem => {
            for record in &records {
                for destination in &destinations {
                    if let Some(request) =
                        destination.create_request(document, record.transformed.clone())
                    {
                        units.push(DispatchUnit {
                            destination: destination.kind(),
                            record_id: Some(record.source_id.clone()),
                            request,
                        });
                    }
                }
            }
        }
    }
    units
}
