// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error classification and per-kind side effects.
//!
//! Every failure inside an invocation becomes an [`ErrorEvent`] and is
//! handed to [`ErrorHandler::handle`] once, in the attempt that produced it.
//! The handler runs the kind's remediation and then the shared logging step:
//!
//! ```text
//! Kind            Trigger               Side effect
//! --------------  --------------------  --------------------------------
//! Authentication  401                   refresh token, then log
//! Authorization   403                   log, then notify operator
//! NotFound        404                   log
//! RateLimit       429                   wait rateLimitWait, then log
//! ServerError     500                   log, then notify operator
//! Timeout         request timed out     log, then wait timeoutWait
//! Connection      connect/IO failure    log, then wait connectionWait
//! Validation      unparseable body      log
//! Generic         anything else         log
//! ```
//!
//! Handling never re-sends a payload. Redelivery is decided separately by
//! the [`RedeliveryPolicy`](crate::resilience::RedeliveryPolicy).

use crate::config::IntegrationConfig;
use crate::destination::DestinationKind;
use crate::error::IntegrationError;
use crate::metrics;
use crate::model::{DocumentKind, EntityType, SyncJob};
use crate::transport::BoxFuture;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Typed failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Authorization,
    NotFound,
    RateLimit,
    ServerError,
    Timeout,
    Connection,
    Validation,
    Generic,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Connection => "connection",
            ErrorKind::Validation => "validation",
            ErrorKind::Generic => "generic",
        }
    }

    /// Human-readable description used in log lines.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::Authentication => "Authentication failed",
            ErrorKind::Authorization => "Access denied",
            ErrorKind::NotFound => "Resource not found",
            ErrorKind::RateLimit => "Rate limit exceeded",
            ErrorKind::ServerError => "Remote server error",
            ErrorKind::Timeout => "Request timed out",
            ErrorKind::Connection => "Connection failed",
            ErrorKind::Validation => "Invalid response data",
            ErrorKind::Generic => "Integration error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind for an HTTP status.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        401 => ErrorKind::Authentication,
        403 => ErrorKind::Authorization,
        404 => ErrorKind::NotFound,
        429 => ErrorKind::RateLimit,
        500 => ErrorKind::ServerError,
        _ => ErrorKind::Generic,
    }
}

/// Kind for an engine error.
pub fn classify(error: &IntegrationError) -> ErrorKind {
    match error {
        IntegrationError::Http { status, .. } => classify_status(*status),
        IntegrationError::Timeout { .. } => ErrorKind::Timeout,
        IntegrationError::Connection { .. } => ErrorKind::Connection,
        IntegrationError::Validation(_) => ErrorKind::Validation,
        _ => ErrorKind::Generic,
    }
}

/// One classified failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub job_id: Uuid,
    pub entity: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<DestinationKind>,
    /// Source identifier of the record, when the failure concerns one record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub message: String,
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEvent {
    /// Classify `error` raised by `job` during `attempt`.
    pub fn from_error(job: &SyncJob, error: &IntegrationError, attempt: u32) -> Self {
        Self {
            kind: classify(error),
            job_id: job.id,
            entity: job.entity,
            document: None,
            destination: None,
            record_id: None,
            status: error.status(),
            message: error.to_string(),
            attempt,
            timestamp: Utc::now(),
        }
    }

    pub fn with_document(mut self, document: DocumentKind) -> Self {
        self.document = Some(document);
        self
    }

    pub fn with_destination(mut self, destination: DestinationKind) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_record(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Collaborator seams
// ═══════════════════════════════════════════════════════════════════════════════

/// Message for a human operator.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorNotice {
    pub subject: String,
    pub message: String,
    pub entity: EntityType,
    pub job_id: Uuid,
}

/// Delivers operator notifications.
pub trait OperatorNotifier: Send + Sync + 'static {
    fn notify(&self, notice: OperatorNotice) -> BoxFuture<'_, ()>;
}

/// Notifier that writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl OperatorNotifier for LogNotifier {
    fn notify(&self, notice: OperatorNotice) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            warn!(
                entity = %notice.entity,
                job_id = %notice.job_id,
                subject = %notice.subject,
                "Operator notification: {}",
                notice.message
            );
            Ok(())
        })
    }
}

/// Renews destination credentials after an authentication failure.
pub trait TokenRefresher: Send + Sync + 'static {
    fn refresh(&self, destination: Option<DestinationKind>) -> BoxFuture<'_, ()>;
}

/// Refresher for static credentials: records the request and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTokenRefresher;

impl TokenRefresher for LoggingTokenRefresher {
    fn refresh(&self, destination: Option<DestinationKind>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match destination {
                Some(d) => info!(destination = %d, "Token refresh requested, credentials are static"),
                None => info!("Token refresh requested, credentials are static"),
            }
            Ok(())
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ErrorHandler
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed waits applied by the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerWaits {
    pub rate_limit: Duration,
    pub timeout: Duration,
    pub connection: Duration,
}

impl Default for HandlerWaits {
    fn default() -> Self {
        Self {
            rate_limit: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            connection: Duration::from_secs(10),
        }
    }
}

impl HandlerWaits {
    pub fn from_config(config: &IntegrationConfig) -> Self {
        Self {
            rate_limit: config.error_handling.rate_limit_wait(),
            timeout: config.error_handling.timeout_wait(),
            connection: config.error_handling.connection_wait(),
        }
    }
}

/// Runs per-kind side effects for classified failures.
#[derive(Clone)]
pub struct ErrorHandler {
    notifier: Arc<dyn OperatorNotifier>,
    refresher: Arc<dyn TokenRefresher>,
    waits: HandlerWaits,
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("waits", &self.waits)
            .finish_non_exhaustive()
    }
}

impl ErrorHandler {
    pub fn new(
        notifier: Arc<dyn OperatorNotifier>,
        refresher: Arc<dyn TokenRefresher>,
        waits: HandlerWaits,
    ) -> Self {
        Self {
            notifier,
            refresher,
            waits,
        }
    }

    /// Same collaborators, different waits.
    pub fn with_waits(&self, waits: HandlerWaits) -> Self {
        Self {
            waits,
            ..self.clone()
        }
    }

    pub fn notifier(&self) -> &Arc<dyn OperatorNotifier> {
        &self.notifier
    }

    /// Apply the kind's side effects, then log.
    pub async fn handle(&self, event: &ErrorEvent) {
        match event.kind {
            ErrorKind::Authentication => {
                if let Err(e) = self.refresher.refresh(event.destination).await {
                    warn!(job_id = %event.job_id, error = %e, "Token refresh failed");
                }
                self.log(event);
            }
            ErrorKind::Authorization | ErrorKind::ServerError => {
                self.log(event);
                self.notify(event).await;
            }
            ErrorKind::RateLimit => {
                tokio::time::sleep(self.waits.rate_limit).await;
                self.log(event);
            }
            ErrorKind::Timeout => {
                self.log(event);
                tokio::time::sleep(self.waits.timeout).await;
            }
            ErrorKind::Connection => {
                self.log(event);
                tokio::time::sleep(self.waits.connection).await;
            }
            ErrorKind::NotFound | ErrorKind::Validation | ErrorKind::Generic => {
                self.log(event);
            }
        }
    }

    /// Shared logging step for every kind.
    fn log(&self, event: &ErrorEvent) {
        metrics::record_error(event.entity, event.kind);
        error!(
            kind = %event.kind,
            entity = %event.entity,
            job_id = %event.job_id,
            document = ?event.document,
            destination = ?event.destination,
            record_id = ?event.record_id,
            status = ?event.status,
            attempt = event.attempt,
            "{}: {}",
            event.kind.description(),
            event.message
        );
    }

    async fn notify(&self, event: &ErrorEvent) {
        let notice = OperatorNotice {
            subject: format!(
                "{} sync: {}",
                event.entity.display_name(),
                event.kind.description()
            ),
            message: event.message.clone(),
            entity: event.entity,
            job_id: event.job_id,
        };
        self.send_notice(notice).await;
    }

    /// Send a free-form notice. Delivery failures are logged, never raised.
    pub async fn send_notice(&self, notice: OperatorNotice) {
        let job_id = notice.job_id;
        if let Err(e) = self.notifier.notify(notice).await {
            warn!(job_id = %job_id, error = %e, "Operator notification failed");
        }
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(
            Arc::new(LogNotifier),
            Arc::new(LoggingTokenRefresher),
            HandlerWaits::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TriggerSource;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        notices: Mutex<Vec<OperatorNotice>>,
        refreshes: Mutex<u32>,
    }

    impl OperatorNotifier for Recording {
        fn notify(&self, notice: OperatorNotice) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                self.notices.lock().await.push(notice);
                Ok(())
            })
        }
    }

    impl TokenRefresher for Recording {
        fn refresh(&self, _destination: Option<DestinationKind>) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                *self.refreshes.lock().await += 1;
                Ok(())
            })
        }
    }

    struct Unreachable;

    impl OperatorNotifier for Unreachable {
        fn notify(&self, _notice: OperatorNotice) -> BoxFuture<'_, ()> {
            Box::pin(async {
                Err(IntegrationError::Connection {
                    url: "smtp://relay".into(),
                    message: "refused".into(),
                })
            })
        }
    }

    fn handler(rec: &Arc<Recording>) -> ErrorHandler {
        ErrorHandler::new(rec.clone(), rec.clone(), HandlerWaits::default())
    }

    fn event_for(status: u16) -> ErrorEvent {
        let job = SyncJob::new(EntityType::Payroll, TriggerSource::Manual, 10);
        let err = IntegrationError::http(status, "http://erp/api/resource/Salary%20Slip", "x");
        ErrorEvent::from_error(&job, &err, 1).with_document(DocumentKind::SalarySlip)
    }

    #[test]
    fn test_status_table() {
        assert_eq!(classify_status(401), ErrorKind::Authentication);
        assert_eq!(classify_status(403), ErrorKind::Authorization);
        assert_eq!(classify_status(404), ErrorKind::NotFound);
        assert_eq!(classify_status(429), ErrorKind::RateLimit);
        assert_eq!(classify_status(500), ErrorKind::ServerError);
        assert_eq!(classify_status(502), ErrorKind::Generic);
        assert_eq!(classify_status(400), ErrorKind::Generic);
    }

    #[test]
    fn test_classify_errors() {
        let timeout = IntegrationError::Timeout { url: "u".into() };
        assert_eq!(classify(&timeout), ErrorKind::Timeout);
        let conn = IntegrationError::Connection {
            url: "u".into(),
            message: "refused".into(),
        };
        assert_eq!(classify(&conn), ErrorKind::Connection);
        assert_eq!(classify(&IntegrationError::Validation("bad".into())), ErrorKind::Validation);
        let schema: IntegrationError = crate::transform::SchemaError::RequiredField {
            document: "Employee",
            field: "employee_id",
            found: "null".into(),
        }
        .into();
        assert_eq!(classify(&schema), ErrorKind::Generic);
    }

    #[test]
    fn test_event_carries_context() {
        let event = event_for(404).with_destination(DestinationKind::PrimaryErp).with_record("S-1");
        assert_eq!(event.kind, ErrorKind::NotFound);
        assert_eq!(event.status, Some(404));
        assert_eq!(event.attempt, 1);
        assert_eq!(event.record_id.as_deref(), Some("S-1"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "not_found");
        assert_eq!(json["destination"], "primary-erp");
    }

    #[tokio::test]
    async fn test_authentication_refreshes_without_notifying() {
        let rec = Arc::new(Recording::default());
        handler(&rec).handle(&event_for(401)).await;
        assert_eq!(*rec.refreshes.lock().await, 1);
        assert!(rec.notices.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_authorization_and_server_error_notify() {
        let rec = Arc::new(Recording::default());
        let h = handler(&rec);
        h.handle(&event_for(403)).await;
        h.handle(&event_for(500)).await;
        let notices = rec.notices.lock().await;
        assert_eq!(notices.len(), 2);
        assert!(notices[0].subject.contains("Access denied"));
        assert!(notices[1].subject.starts_with("Payroll sync"));
    }

    #[tokio::test]
    async fn test_not_found_only_logs() {
        let rec = Arc::new(Recording::default());
        handler(&rec).handle(&event_for(404)).await;
        assert!(rec.notices.lock().await.is_empty());
        assert_eq!(*rec.refreshes.lock().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_thirty_seconds() {
        let rec = Arc::new(Recording::default());
        let start = tokio::time::Instant::now();
        handler(&rec).handle(&event_for(429)).await;
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_waits_after_logging() {
        let rec = Arc::new(Recording::default());
        let job = SyncJob::new(EntityType::Employee, TriggerSource::Scheduled, 10);
        let err = IntegrationError::Connection {
            url: "http://hr/api/employees".into(),
            message: "refused".into(),
        };
        let event = ErrorEvent::from_error(&job, &err, 2);
        let start = tokio::time::Instant::now();
        handler(&rec).handle(&event).await;
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_failed_notice_is_absorbed() {
        let rec = Arc::new(Recording::default());
        let h = ErrorHandler::new(Arc::new(Unreachable), rec.clone(), HandlerWaits::default());
        let job = SyncJob::new(EntityType::Payroll, TriggerSource::Manual, 10);
        h.send_notice(OperatorNotice {
            subject: "Payroll sync: redelivery exhausted".into(),
            message: "2 records dead-lettered".into(),
            entity: EntityType::Payroll,
            job_id: job.id,
        })
        .await;
        h.handle(&event_for(500)).await;
        assert_eq!(*rec.refreshes.lock().await, 0);
    }
}
