//! Internal helpers for validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the ledger enforces consistent invariants.

use chrono::{DateTime, Utc};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Trim and NFC-normalize an id so it compares equal to stored ones.
pub(crate) fn normalize_id(value: &str) -> String {
    value.trim().nfc().collect()
}

/// Trim and NFC-normalize a required catalog reference (branch, SKU, actor).
pub(crate) fn normalize_required_id(value: &str, label: &str) -> ResultEngine<String> {
    let id = normalize_id(value);
    if id.is_empty() {
        return Err(EngineError::Validation(format!("{label} must not be empty")));
    }
    Ok(id)
}

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidRecord(format!("invalid {label} id")))
}

/// Convert stored epoch milliseconds into a UTC instant.
pub(crate) fn from_millis(ms: i64, label: &str) -> ResultEngine<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| EngineError::InvalidRecord(format!("{label} out of range: {ms}")))
}
