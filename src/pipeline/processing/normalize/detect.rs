use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::{IngestError, Result};

use super::registry::FormatRegistry;
use super::FormatHandler;

/// Shape summary of an unrecognized payload, carried by `UnknownFormat` so
/// the user can correct the file or register a handler for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadFingerprint {
    /// Top-level keys of the first (non-empty, when available) record.
    pub top_level_keys: Vec<String>,
    pub record_count: usize,
    pub was_sequence: bool,
}

impl fmt::Display for PayloadFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "top_level_keys=[{}] record_count={} sequence={}",
            self.top_level_keys.join(", "),
            self.record_count,
            self.was_sequence
        )
    }
}

/// View a payload as a sequence of raw records. A single bare record is a
/// sequence of one; `null` is an empty sequence.
pub fn records_of(payload: &Value) -> &[Value] {
    match payload {
        Value::Array(records) => records.as_slice(),
        Value::Null => &[],
        other => std::slice::from_ref(other),
    }
}

/// The first record carrying any content. Nulls and empty containers are
/// skipped; recognition decisions are made from this record alone.
pub fn first_non_empty_record(records: &[Value]) -> Option<&Value> {
    records.iter().find(|record| match record {
        Value::Null => false,
        Value::Object(obj) => !obj.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        _ => true,
    })
}

pub fn fingerprint(payload: &Value) -> PayloadFingerprint {
    let records = records_of(payload);
    let probe = first_non_empty_record(records).or_else(|| records.first());
    let top_level_keys = probe
        .and_then(Value::as_object)
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default();
    PayloadFingerprint {
        top_level_keys,
        record_count: records.len(),
        was_sequence: payload.is_array(),
    }
}

/// Classify a payload into exactly one registered format.
///
/// Recognizers run in registry order (priority descending, registration
/// order on ties) against the first non-empty record; the first match wins
/// and nothing is transformed on failure.
pub fn detect<'r>(registry: &'r FormatRegistry, payload: &Value) -> Result<&'r dyn FormatHandler> {
    let records = records_of(payload);
    let probe = first_non_empty_record(records).ok_or_else(|| IngestError::UnknownFormat {
        fingerprint: fingerprint(payload),
    })?;
    registry
        .ordered()
        .into_iter()
        .find(|handler| handler.recognize(probe))
        .ok_or_else(|| IngestError::UnknownFormat {
            fingerprint: fingerprint(payload),
        })
}
