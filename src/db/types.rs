//! Database-agnostic value mapping.
//!
//! Queries run through the engines' text protocols, so every column value
//! can be read as text. Type names only decide how that text becomes JSON:
//!
//! 1. `TypeCategory` classifies the column type name
//! 2. the text is parsed for that category, falling back to the plain string
//!
//! Values that are not JSON primitives (DECIMAL, dates, times, enums, ...)
//! therefore arrive as their string representation.

use crate::models::Row;
use serde_json::Value as JsonValue;
use sqlx::{Column, ColumnIndex, Decode, Row as SqlxRow, TypeInfo, ValueRef};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Boolean,
    Json,
    Binary,
    /// Strings and everything kept as its string representation
    Text,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.contains("bool") {
        return TypeCategory::Boolean;
    }

    // Exact representation matters more than a JSON number here
    if lower.contains("decimal") || lower.contains("numeric") {
        return TypeCategory::Text;
    }

    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    TypeCategory::Text
}

/// Decode binary data to a JSON value: UTF-8 text when valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

/// Convert a column's text representation into JSON for its category.
pub fn text_to_json(text: String, category: TypeCategory) -> JsonValue {
    match category {
        TypeCategory::Integer => {
            if let Ok(v) = text.parse::<i64>() {
                return JsonValue::Number(v.into());
            }
            if let Ok(v) = text.parse::<u64>() {
                return JsonValue::Number(v.into());
            }
            JsonValue::String(text)
        }
        TypeCategory::Float => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::String(text)),
        TypeCategory::Boolean => match text.to_ascii_lowercase().as_str() {
            "1" | "t" | "true" => JsonValue::Bool(true),
            "0" | "f" | "false" => JsonValue::Bool(false),
            _ => JsonValue::String(text),
        },
        TypeCategory::Json => serde_json::from_str(&text).unwrap_or(JsonValue::String(text)),
        TypeCategory::Binary | TypeCategory::Text => JsonValue::String(text),
    }
}

/// Convert a database row into a column-name to value map.
pub fn row_to_json<R>(row: &R) -> Row
where
    R: SqlxRow,
    usize: ColumnIndex<R>,
    for<'r> String: Decode<'r, R::Database>,
    for<'r> Vec<u8>: Decode<'r, R::Database>,
{
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            (
                col.name().to_string(),
                decode_column(row, idx, col.type_info()),
            )
        })
        .collect()
}

fn decode_column<R>(
    row: &R,
    idx: usize,
    declared: &<R::Database as sqlx::Database>::TypeInfo,
) -> JsonValue
where
    R: SqlxRow,
    usize: ColumnIndex<R>,
    for<'r> String: Decode<'r, R::Database>,
    for<'r> Vec<u8>: Decode<'r, R::Database>,
{
    // SQLite expression columns have no declared type; use the value's own
    let category = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return JsonValue::Null,
        Ok(raw) if declared.is_null() => categorize_type(raw.type_info().name()),
        _ => categorize_type(declared.name()),
    };

    if category == TypeCategory::Binary {
        if let Ok(bytes) = row.try_get_unchecked::<Option<Vec<u8>>, _>(idx) {
            return bytes
                .map(|b| decode_binary_value(&b))
                .unwrap_or(JsonValue::Null);
        }
    }

    match row.try_get_unchecked::<Option<String>, _>(idx) {
        Ok(Some(text)) => text_to_json(text, category),
        Ok(None) => JsonValue::Null,
        Err(e) => match row.try_get_unchecked::<Option<Vec<u8>>, _>(idx) {
            Ok(Some(bytes)) => JsonValue::String(String::from_utf8_lossy(&bytes).into_owned()),
            Ok(None) => JsonValue::Null,
            Err(_) => {
                tracing::warn!(column = idx, error = %e, "Failed to decode column");
                JsonValue::Null
            }
        },
    }
}
