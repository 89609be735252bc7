//! # Integration Engine
//!
//! Scheduled and on-demand synchronisation between an HR source-of-record
//! and one or more ERP back-ends.
//!
//! ## Architecture
//!
//! ```text
//!  Scheduler (per entity) ──┐
//!                           ├──► Launcher ──spawn──► SyncPipeline::run
//!  Gateway (axum) ──────────┘    (single-flight)       fetch → transform → dispatch
//!                                                              │ failures
//!                                                              ▼
//!                                            ErrorHandler + RedeliveryPolicy
//!                                                              │ exhausted
//!                                                              ▼
//!                                                        Dead Letter Sink
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use integration_engine::{IntegrationEngine, IntegrationConfig};
//! use integration_engine::model::{EntityType, TriggerSource};
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (_tx, rx) = watch::channel(IntegrationConfig::default());
//!
//!     let engine = IntegrationEngine::new(rx);
//!     engine.start().await.expect("Failed to start");
//!     engine.trigger(EntityType::Employee, TriggerSource::Manual).await.unwrap();
//!
//!     engine.shutdown().await;
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod dead_letter;
pub mod destination;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod resilience;
pub mod reverse;
pub mod schema;
pub mod source;
pub mod transform;
pub mod transport;

// Re-exports for convenience
pub use classifier::{ErrorEvent, ErrorHandler, ErrorKind, OperatorNotifier, TokenRefresher};
pub use config::{IntegrationConfig, SyncSettings};
pub use coordinator::{EngineState, IntegrationEngine, Launch, StatusRegistry};
pub use dead_letter::{DeadLetterEntry, DeadLetterSink, FileDeadLetterSink};
pub use destination::{Destination, DestinationKind};
pub use error::{IntegrationError, Result};
pub use model::{DocumentKind, EntityType, SyncJob, SyncRecord, TriggerSource};
pub use pipeline::{SyncOutcome, SyncPipeline};
pub use transport::{HttpTransport, ReqwestTransport};
