//! Fuzz target for record transformation.
//!
//! Feeds arbitrary JSON through every document schema in both directions.
//! Transformation must never panic, and a record that maps to the ERP
//! must carry its identifier as text.

#![no_main]

use integration_engine::model::DocumentKind;
use integration_engine::transform::{extract_records, to_sync_record, transform, Direction};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

const KINDS: [DocumentKind; 8] = [
    DocumentKind::Employee,
    DocumentKind::SalarySlip,
    DocumentKind::Account,
    DocumentKind::JournalEntry,
    DocumentKind::ExpenseClaim,
    DocumentKind::PurchaseOrder,
    DocumentKind::LeaveApplication,
    DocumentKind::GlEntry,
];

fuzz_target!(|data: &[u8]| {
    let Ok(body) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    for record in extract_records(&body) {
        for kind in KINDS {
            if let Ok(synced) = to_sync_record(kind, record.clone()) {
                assert!(!synced.source_id.trim().is_empty());
                assert!(synced.transformed.is_object());
            }
            let _ = transform(kind.schema(), &record, Direction::ToSource);
        }
    }
});
