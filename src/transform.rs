// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Transformation engine.
//!
//! Applies an [`EntitySchema`] to a JSON record in one [`Direction`]. The
//! operation is pure: the same record and direction always produce the same
//! output, and nothing is read from the clock or environment.
//!
//! # Coercion Rules
//!
//! | Kind | Present input | Absent / unusable input |
//! |------|---------------|-------------------------|
//! | Text | string, number or bool rendered as text | rule default |
//! | Date | normalized to `YYYY-MM-DD`, passed through if unparseable | rule default |
//! | Decimal | exact decimal | `0` |
//! | Integer | whole number (decimals truncate) | `0` |
//! | Flag | `true/false`, `1/0`, `yes/no` | `false` |
//! | Enum | table lookup, case-insensitive | direction default |
//! | List | each element mapped by sub-rules | `[]` |
//!
//! Only the schema's required identifier can fail, with [`SchemaError`].

use crate::model::{DocumentKind, SyncRecord};
use crate::schema::{EntitySchema, EnumMap, FieldDefault, FieldKind, FieldRule, Flow, Literal};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use std::str::FromStr;
use thiserror::Error;

/// Direction of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// HR source → ERP.
    ToDestination,
    /// ERP → HR source.
    ToSource,
}

/// A record that cannot be mapped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{document}: required field `{field}` cannot be coerced to text (found {found})")]
    RequiredField {
        document: &'static str,
        field: &'static str,
        found: String,
    },
}

/// Map one record through `schema`.
pub fn transform(
    schema: &EntitySchema,
    record: &Value,
    direction: Direction,
) -> Result<Value, SchemaError> {
    let mut out = Map::new();
    apply_rules(schema.document, schema.fields, record, direction, &mut out)?;
    Ok(Value::Object(out))
}

/// Read the identifier of a record on the given side of the mapping.
pub fn record_id(
    schema: &EntitySchema,
    record: &Value,
    side: Direction,
) -> Result<String, SchemaError> {
    let Some(rule) = schema.identifier() else {
        return Ok(String::new());
    };
    let field = match side {
        Direction::ToDestination => rule.source,
        Direction::ToSource => rule.destination,
    };
    let input = record.get(field);
    as_text(input).ok_or_else(|| SchemaError::RequiredField {
        document: schema.document,
        field,
        found: describe(input),
    })
}

/// Transform a raw source record into a [`SyncRecord`] for `kind`.
pub fn to_sync_record(kind: DocumentKind, raw: Value) -> Result<SyncRecord, SchemaError> {
    let schema = kind.schema();
    let source_id = record_id(schema, &raw, Direction::ToDestination)?;
    let transformed = transform(schema, &raw, Direction::ToDestination)?;
    Ok(SyncRecord {
        source_id,
        raw,
        transformed,
    })
}

/// Pull the record list out of a response body.
///
/// Accepts `{"data": [...]}` or a bare array; anything else yields nothing.
pub fn extract_records(body: &Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(items)) => items.clone(),
            _ => {
                tracing::debug!("Response body has no data array");
                Vec::new()
            }
        },
        _ => {
            tracing::debug!("Response body is neither an array nor an object");
            Vec::new()
        }
    }
}

fn apply_rules(
    document: &'static str,
    rules: &'static [FieldRule],
    record: &Value,
    direction: Direction,
    out: &mut Map<String, Value>,
) -> Result<(), SchemaError> {
    for rule in rules {
        if rule.flow == Flow::ToDestination && direction == Direction::ToSource {
            continue;
        }
        let (input_key, output_key) = match direction {
            Direction::ToDestination => (rule.source, rule.destination),
            Direction::ToSource => (rule.destination, rule.source),
        };

        if let FieldKind::Group(sub) = rule.kind {
            match direction {
                Direction::ToDestination => {
                    let mut nested = Map::new();
                    apply_rules(document, sub, record, direction, &mut nested)?;
                    out.insert(output_key.to_string(), Value::Object(nested));
                }
                Direction::ToSource => {
                    let empty = Value::Object(Map::new());
                    let nested = record
                        .get(rule.destination)
                        .filter(|v| v.is_object())
                        .unwrap_or(&empty);
                    apply_rules(document, sub, nested, direction, out)?;
                }
            }
            continue;
        }

        let input = record.get(input_key).filter(|v| !v.is_null());
        if rule.required {
            let id = as_text(input).ok_or_else(|| SchemaError::RequiredField {
                document,
                field: input_key,
                found: describe(record.get(input_key)),
            })?;
            out.insert(output_key.to_string(), Value::String(id));
            continue;
        }

        if let Some(value) = coerce(document, rule, input, direction)? {
            out.insert(output_key.to_string(), value);
        }
    }
    Ok(())
}

fn coerce(
    document: &'static str,
    rule: &FieldRule,
    input: Option<&Value>,
    direction: Direction,
) -> Result<Option<Value>, SchemaError> {
    let value = match rule.kind {
        FieldKind::Text => as_text(input).map(Value::String),
        FieldKind::Date => as_text(input).map(|s| Value::String(normalize_date(&s))),
        FieldKind::Decimal => Some(decimal_value(
            input.and_then(parse_decimal).unwrap_or(Decimal::ZERO),
        )),
        FieldKind::Integer => Some(Value::from(input.and_then(parse_integer).unwrap_or(0))),
        FieldKind::Flag => Some(Value::Bool(input.and_then(parse_flag).unwrap_or(false))),
        FieldKind::InvertedFlag => {
            let parsed = input.and_then(parse_flag).map(|b| !b);
            let fallback = match (rule.default, direction) {
                (FieldDefault::False, Direction::ToDestination) => false,
                (FieldDefault::False, Direction::ToSource) => true,
                _ => false,
            };
            Some(Value::Bool(parsed.unwrap_or(fallback)))
        }
        FieldKind::Enum(map) => Some(lookup_enum(map, input, direction).to_value()),
        FieldKind::Constant(literal) => Some(literal.to_value()),
        FieldKind::List(sub) => {
            let items = match input {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| {
                        let mut mapped = Map::new();
                        apply_rules(document, sub, item, direction, &mut mapped)?;
                        Ok(Value::Object(mapped))
                    })
                    .collect::<Result<Vec<_>, SchemaError>>()?,
                _ => Vec::new(),
            };
            Some(Value::Array(items))
        }
        FieldKind::Group(_) => None,
    };

    Ok(value.or_else(|| default_value(rule.default)))
}

fn default_value(default: FieldDefault) -> Option<Value> {
    match default {
        FieldDefault::Omit => None,
        FieldDefault::Text(s) => Some(Value::String(s.to_string())),
        FieldDefault::Zero => Some(Value::from(0)),
        FieldDefault::False => Some(Value::Bool(false)),
    }
}

fn lookup_enum(map: &EnumMap, input: Option<&Value>, direction: Direction) -> Literal {
    let (table, default) = match direction {
        Direction::ToDestination => (map.to_destination, map.destination_default),
        Direction::ToSource => (map.to_source, map.source_default),
    };
    let Some(key) = as_text(input).map(|s| s.trim().to_lowercase()) else {
        return default;
    };
    table
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, literal)| *literal)
        .unwrap_or(default)
}

/// Render a scalar as non-empty text.
fn as_text(input: Option<&Value>) -> Option<String> {
    match input? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn describe(input: Option<&Value>) -> String {
    match input {
        None => "absent".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::String(_)) => "empty string".to_string(),
        Some(Value::Array(_)) => "array".to_string(),
        Some(Value::Object(_)) => "object".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Normalize a date-like string to `YYYY-MM-DD`.
///
/// Accepts plain dates, RFC 3339 timestamps and `YYYY-MM-DD HH:MM:SS`.
/// Anything else is returned unchanged.
pub fn normalize_date(raw: &str) -> String {
    let s = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return ts.date_naive().format("%Y-%m-%d").to_string();
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return ts.date().format("%Y-%m-%d").to_string();
        }
    }
    raw.to_string()
}

/// Parse a decimal from a JSON number or numeric string.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn parse_integer(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    parse_decimal(value).and_then(|d| d.trunc().to_i64())
}

fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Amounts keep their decimal text; `Number` holds it verbatim under
/// serde_json's `arbitrary_precision`.
fn decimal_value(d: Decimal) -> Value {
    let text = d.normalize().to_string();
    Number::from_str(&text)
        .map(Value::Number)
        .unwrap_or(Value::String(text))
}
