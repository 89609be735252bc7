// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the integration engine.
//!
//! Errors are categorized by where they arise (source or destination HTTP
//! call, transformation, local persistence) and carry enough context to be
//! classified into an [`ErrorKind`](crate::classifier::ErrorKind) and logged.
//!
//! # Error Categories
//!
//! | Error Type | Classified As | Description |
//! |------------|---------------|-------------|
//! | `Http` | by status | Non-2xx response from source or destination |
//! | `Timeout` | Timeout | Request exceeded its deadline |
//! | `Connection` | Connection | Connect/IO failure before a response |
//! | `Schema` | Generic | Required field could not be coerced |
//! | `Validation` | Validation | Response body was not the JSON we expect |
//! | `Config` | Generic | Configuration invalid |
//! | `DeadLetter` | Generic | Could not persist a dead-letter entry |
//! | `InvalidState` | Generic | Engine state machine violation |
//! | `Shutdown` | Generic | Engine is shutting down |
//! | `Internal` | Generic | Unexpected internal error |
//!
//! Classification never decides whether an invocation is redelivered: the
//! redelivery policy applies to every failed invocation regardless of kind.

use crate::transform::SchemaError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for integration operations.
pub type Result<T> = std::result::Result<T, IntegrationError>;

/// Errors that can occur while synchronising.
#[derive(Error, Debug)]
pub enum IntegrationError {
    /// Remote system answered with a non-success status.
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        status: u16,
        url: String,
        message: String,
    },

    /// Request did not complete within the configured timeout.
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// Connection could not be established or dropped mid-request.
    #[error("Connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    /// A record could not be mapped through its schema.
    ///
    /// Aborts the current invocation only.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A response body could not be interpreted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid or missing configuration.
    ///
    /// Fix the configuration and restart.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dead-letter entry could not be written.
    #[error("Dead letter write to {} failed: {source}", path.display())]
    DeadLetter {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Engine state machine violation.
    ///
    /// Occurs when an operation is attempted in the wrong state
    /// (e.g., calling `start()` on an already-running engine).
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Shutdown in progress.
    #[error("Shutdown in progress")]
    Shutdown,

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntegrationError {
    /// Build an HTTP error from a response status and body.
    pub fn http(status: u16, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            url: url.into(),
            message: message.into(),
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for IntegrationError {
    fn from(e: serde_json::Error) -> Self {
        Self::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_formatting() {
        let err = IntegrationError::http(503, "http://erp/api/resource/Employee", "maintenance");
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("/api/resource/Employee"));
        assert!(msg.contains("maintenance"));
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn test_status_absent_for_transport_errors() {
        let err = IntegrationError::Timeout {
            url: "http://hr/api/employees".to_string(),
        };
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_schema_error_is_transparent() {
        let err: IntegrationError = SchemaError::RequiredField {
            document: "Employee",
            field: "employee_id",
            found: "null".to_string(),
        }
        .into();
        assert!(err.to_string().contains("employee_id"));
    }

    #[test]
    fn test_json_error_becomes_validation() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: IntegrationError = parse.into();
        assert!(matches!(err, IntegrationError::Validation(_)));
    }

    #[test]
    fn test_invalid_state_formatting() {
        let err = IntegrationError::InvalidState {
            expected: "Created".to_string(),
            actual: "Running".to_string(),
        };
        assert!(err.to_string().contains("Created"));
        assert!(err.to_string().contains("Running"));
    }

    #[test]
    fn test_dead_letter_error_mentions_path() {
        let err = IntegrationError::DeadLetter {
            path: PathBuf::from("/var/errors/error-x.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/var/errors/error-x.json"));
    }
}
