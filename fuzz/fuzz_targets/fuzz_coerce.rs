//! Fuzz target for scalar coercion.
//!
//! Dates and amounts arrive as free text from the HR system; parsing them
//! must never panic.

#![no_main]

use integration_engine::transform::{normalize_date, parse_decimal};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|text: &str| {
    let normalized = normalize_date(text);
    // Normalizing is idempotent.
    assert_eq!(normalize_date(&normalized), normalized);

    if let Some(amount) = parse_decimal(&Value::String(text.to_string())) {
        let again = parse_decimal(&Value::String(amount.to_string()));
        assert_eq!(again, Some(amount));
    }
});
