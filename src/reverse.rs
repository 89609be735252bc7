// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Reverse sync: destination → HR source.
//!
//! Reads the entity's reverse document from the first selected destination,
//! maps every record back through its schema and sends the lot to the
//! source in one `PUT .../bulk-update`:
//!
//! ```text
//! Entity      Reads              Writes                         Envelope
//! ----------  -----------------  -----------------------------  ------------------
//! employee    Employee           employees/bulk-update          employees
//! payroll     Salary Slip        payroll/bulk-update            payroll
//! accounting  GL Entry           accounting/bulk-update         gl_entries
//! leave       Leave Application  leave-applications/bulk-update leave_applications
//! ```
//!
//! Reverse runs are not redelivered. A failure is classified, handled and
//! logged, and the run ends.

use crate::classifier::{ErrorEvent, ErrorKind, HandlerWaits};
use crate::config::IntegrationConfig;
use crate::destination::select_destinations;
use crate::error::{IntegrationError, Result};
use crate::metrics;
use crate::model::SyncJob;
use crate::pipeline::SyncPipeline;
use crate::source::SourceClient;
use crate::transform::{extract_records, transform, Direction};
use crate::transport::HttpTransport;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Result of one reverse run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseOutcome {
    pub job_id: Uuid,
    /// Records sent to the source.
    pub updated: usize,
    /// Kind of the failure that ended the run, if any.
    pub error: Option<ErrorKind>,
}

impl<T: HttpTransport> SyncPipeline<T> {
    /// Pull destination records back into the source.
    pub async fn run_reverse(&self, job: SyncJob, config: Arc<IntegrationConfig>) -> ReverseOutcome {
        let span = info_span!("reverse_sync", entity = %job.entity, job_id = %job.id);
        async {
            let result = self.reverse_once(&job, &config).await;
            match result {
                Ok(updated) => {
                    metrics::record_reverse_sync(job.entity, updated, true);
                    info!(updated, "Reverse sync completed");
                    ReverseOutcome {
                        job_id: job.id,
                        updated,
                        error: None,
                    }
                }
                Err(e) => {
                    metrics::record_reverse_sync(job.entity, 0, false);
                    let event = ErrorEvent::from_error(&job, &e, 1)
                        .with_document(job.entity.reverse_document());
                    let handler = self.handler().with_waits(HandlerWaits::from_config(&config));
                    handler.handle(&event).await;
                    ReverseOutcome {
                        job_id: job.id,
                        updated: 0,
                        error: Some(event.kind),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn reverse_once(&self, job: &SyncJob, config: &IntegrationConfig) -> Result<usize> {
        let document = job.entity.reverse_document();
        let Some(destination) = select_destinations(config, document).into_iter().next() else {
            warn!(document = %document, "No enabled destination to read from");
            return Ok(0);
        };
        let Some(request) = destination.list_request(document) else {
            return Ok(0);
        };

        let url = request.url.clone();
        let response = self.transport().send(request).await?.error_for_status(&url)?;
        let body = response.json()?;

        let schema = document.schema();
        let records = extract_records(&body)
            .iter()
            .map(|r| transform(schema, r, Direction::ToSource).map_err(IntegrationError::from))
            .collect::<Result<Vec<_>>>()?;

        if records.is_empty() {
            info!(destination = %destination.kind(), "No records to send back");
            return Ok(0);
        }

        let count = records.len();
        SourceClient::from_config(config)
            .bulk_update(self.transport().as_ref(), job.entity, document, records)
            .await?;
        Ok(count)
    }
}
