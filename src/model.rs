// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Core domain types: entity types, document kinds, jobs and records.
//!
//! An [`EntityType`] is the unit of scheduling and triggering. It expands
//! into one or more [`DocumentKind`]s, each of which is fetched, transformed
//! and dispatched on its own.
//!
//! ```text
//! Employee   → [Employee]
//! Payroll    → [SalarySlip]
//! Accounting → [Account, JournalEntry, ExpenseClaim, PurchaseOrder]
//! Leave      → [LeaveApplication]
//! ```

use crate::schema::{self, EntitySchema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// A business domain synchronised on its own schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Employee,
    Payroll,
    Accounting,
    Leave,
}

impl EntityType {
    /// Every entity type, in timer registration order.
    pub const ALL: [EntityType; 4] = [
        EntityType::Employee,
        EntityType::Payroll,
        EntityType::Accounting,
        EntityType::Leave,
    ];

    /// Document kinds synced by one invocation, in dispatch order.
    pub fn documents(&self) -> &'static [DocumentKind] {
        match self {
            EntityType::Employee => &[DocumentKind::Employee],
            EntityType::Payroll => &[DocumentKind::SalarySlip],
            EntityType::Accounting => &[
                DocumentKind::Account,
                DocumentKind::JournalEntry,
                DocumentKind::ExpenseClaim,
                DocumentKind::PurchaseOrder,
            ],
            EntityType::Leave => &[DocumentKind::LeaveApplication],
        }
    }

    /// Document read back from the destination during reverse sync.
    pub fn reverse_document(&self) -> DocumentKind {
        match self {
            EntityType::Employee => DocumentKind::Employee,
            EntityType::Payroll => DocumentKind::SalarySlip,
            EntityType::Accounting => DocumentKind::GlEntry,
            EntityType::Leave => DocumentKind::LeaveApplication,
        }
    }

    /// Source path that receives reverse-sync bulk updates.
    pub fn bulk_update_path(&self) -> &'static str {
        match self {
            EntityType::Employee => "employees",
            EntityType::Payroll => "payroll",
            EntityType::Accounting => "accounting",
            EntityType::Leave => "leave-applications",
        }
    }

    /// Lowercase name used in URLs, config keys and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Employee => "employee",
            EntityType::Payroll => "payroll",
            EntityType::Accounting => "accounting",
            EntityType::Leave => "leave",
        }
    }

    /// Capitalised name used in operator-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            EntityType::Employee => "Employee",
            EntityType::Payroll => "Payroll",
            EntityType::Accounting => "Accounting",
            EntityType::Leave => "Leave",
        }
    }

    /// Parse a lowercase path segment.
    pub fn parse(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == segment)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a transformed document list is sent to a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Whole batch in one call; the call's failure fails the document.
    Combined,
    /// One call per record; failures are isolated per record.
    PerItem,
}

/// A document type exchanged with the destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Employee,
    SalarySlip,
    Account,
    JournalEntry,
    ExpenseClaim,
    PurchaseOrder,
    LeaveApplication,
    GlEntry,
}

impl DocumentKind {
    /// Path under the source base URL.
    pub fn source_path(&self) -> &'static str {
        match self {
            DocumentKind::Employee => "employees",
            DocumentKind::SalarySlip => "payroll",
            DocumentKind::Account => "accounts",
            DocumentKind::JournalEntry => "journal-entries",
            DocumentKind::ExpenseClaim => "expense-claims",
            DocumentKind::PurchaseOrder => "purchase-orders",
            DocumentKind::LeaveApplication => "leave-applications",
            DocumentKind::GlEntry => "gl-entries",
        }
    }

    /// Whether the source endpoint takes a `batch` query parameter.
    pub fn is_batched(&self) -> bool {
        matches!(
            self,
            DocumentKind::Employee | DocumentKind::SalarySlip | DocumentKind::JournalEntry
        )
    }

    /// DocType name on the primary ERP.
    pub fn doctype(&self) -> &'static str {
        match self {
            DocumentKind::Employee => "Employee",
            DocumentKind::SalarySlip => "Salary Slip",
            DocumentKind::Account => "Account",
            DocumentKind::JournalEntry => "Journal Entry",
            DocumentKind::ExpenseClaim => "Expense Claim",
            DocumentKind::PurchaseOrder => "Purchase Order",
            DocumentKind::LeaveApplication => "Leave Application",
            DocumentKind::GlEntry => "GL Entry",
        }
    }

    /// Path on the generic ERP, `None` when the generic ERP does not take this document.
    pub fn generic_path(&self) -> Option<&'static str> {
        match self {
            DocumentKind::Employee => Some("employees"),
            DocumentKind::SalarySlip => Some("payroll"),
            DocumentKind::Account => Some("accounts"),
            _ => None,
        }
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        match self {
            DocumentKind::Employee => DispatchMode::Combined,
            _ => DispatchMode::PerItem,
        }
    }

    /// Key wrapping a record list in combined and bulk-update bodies.
    pub fn envelope_key(&self) -> &'static str {
        match self {
            DocumentKind::Employee => "employees",
            DocumentKind::SalarySlip => "payroll",
            DocumentKind::Account => "accounts",
            DocumentKind::JournalEntry => "journal_entries",
            DocumentKind::ExpenseClaim => "expense_claims",
            DocumentKind::PurchaseOrder => "purchase_orders",
            DocumentKind::LeaveApplication => "leave_applications",
            DocumentKind::GlEntry => "gl_entries",
        }
    }

    pub fn schema(&self) -> &'static EntitySchema {
        match self {
            DocumentKind::Employee => &schema::EMPLOYEE,
            DocumentKind::SalarySlip => &schema::SALARY_SLIP,
            DocumentKind::Account => &schema::ACCOUNT,
            DocumentKind::JournalEntry => &schema::JOURNAL_ENTRY,
            DocumentKind::ExpenseClaim => &schema::EXPENSE_CLAIM,
            DocumentKind::PurchaseOrder => &schema::PURCHASE_ORDER,
            DocumentKind::LeaveApplication => &schema::LEAVE_APPLICATION,
            DocumentKind::GlEntry => &schema::GL_ENTRY,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.doctype())
    }
}

/// What started a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Scheduled,
    Manual,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSource::Scheduled => f.write_str("scheduled"),
            TriggerSource::Manual => f.write_str("manual"),
        }
    }
}

/// One invocation of a pipeline for one entity type.
///
/// Discarded once the invocation reaches a terminal state.
#[derive(Debug, Clone)]
pub struct SyncJob {
    pub id: Uuid,
    pub entity: EntityType,
    pub trigger: TriggerSource,
    pub batch_size: usize,
    pub started_at: DateTime<Utc>,
}

impl SyncJob {
    pub fn new(entity: EntityType, trigger: TriggerSource, batch_size: usize) -> Self {
        Self {
            id: Uuid::now_v7(),
            entity,
            trigger,
            batch_size,
            started_at: Utc::now(),
        }
    }
}

/// A raw source record paired with its transformed counterpart.
///
/// `source_id` is captured before transformation and never rewritten.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRecord {
    pub source_id: String,
    pub raw: Value,
    pub transformed: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_documents() {
        assert_eq!(EntityType::Employee.documents(), &[DocumentKind::Employee]);
        assert_eq!(EntityType::Accounting.documents().len(), 4);
        assert_eq!(EntityType::Accounting.documents()[0], DocumentKind::Account);
    }

    #[test]
    fn test_entity_parse_roundtrip() {
        for entity in EntityType::ALL {
            assert_eq!(EntityType::parse(entity.as_str()), Some(entity));
        }
        assert_eq!(EntityType::parse("inventory"), None);
    }

    #[test]
    fn test_only_employee_is_combined() {
        assert_eq!(DocumentKind::Employee.dispatch_mode(), DispatchMode::Combined);
        for kind in [
            DocumentKind::SalarySlip,
            DocumentKind::JournalEntry,
            DocumentKind::ExpenseClaim,
            DocumentKind::PurchaseOrder,
            DocumentKind::LeaveApplication,
        ] {
            assert_eq!(kind.dispatch_mode(), DispatchMode::PerItem);
        }
    }

    #[test]
    fn test_generic_paths() {
        assert_eq!(DocumentKind::Employee.generic_path(), Some("employees"));
        assert_eq!(DocumentKind::JournalEntry.generic_path(), None);
        assert_eq!(DocumentKind::LeaveApplication.generic_path(), None);
    }

    #[test]
    fn test_batched_endpoints() {
        assert!(DocumentKind::Employee.is_batched());
        assert!(DocumentKind::JournalEntry.is_batched());
        assert!(!DocumentKind::ExpenseClaim.is_batched());
    }

    #[test]
    fn test_sync_job_ids_are_unique() {
        let a = SyncJob::new(EntityType::Payroll, TriggerSource::Manual, 50);
        let b = SyncJob::new(EntityType::Payroll, TriggerSource::Manual, 50);
        assert_ne!(a.id, b.id);
        assert_eq!(a.trigger.to_string(), "manual");
    }
}
