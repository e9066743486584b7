use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::constants::{DEFAULT_SAMPLE_LIMIT, REASON_DUPLICATE_ROW_ID, REASON_TRANSFORM_FAILED};
use crate::domain::NormalizedRow;

use super::{FormatHandler, IngestContext};

/// Per-ingestion accounting: what went in, what came out, and why records
/// or topics were dropped along the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub input_record_count: usize,
    pub output_row_count: usize,
    pub dropped_record_count: usize,
    /// reason tag → occurrence count
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reasons: BTreeMap<String, u64>,
    /// reason tag → originating record ids, bounded to the first N
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub samples: BTreeMap<String, Vec<String>>,
    #[serde(skip)]
    sample_limit: usize,
}

impl Diagnostics {
    pub fn new(sample_limit: usize) -> Self {
        Self {
            input_record_count: 0,
            output_row_count: 0,
            dropped_record_count: 0,
            reasons: BTreeMap::new(),
            samples: BTreeMap::new(),
            sample_limit,
        }
    }

    /// Count one occurrence of `reason`, remembering the originating record
    /// id while under the sample bound.
    pub fn count(&mut self, reason: &str, record_ref: &str) {
        *self.reasons.entry(reason.to_string()).or_insert(0) += 1;
        let samples = self.samples.entry(reason.to_string()).or_default();
        if samples.len() < self.sample_limit {
            samples.push(record_ref.to_string());
        }
    }

    pub fn reason_count(&self, reason: &str) -> u64 {
        self.reasons.get(reason).copied().unwrap_or(0)
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_LIMIT)
    }
}

/// Apply `handler` to every record in source order and concatenate the
/// produced rows.
///
/// A failing record is logged, counted under `transform_failed`, and never
/// aborts the ingestion. Row ids are kept unique even against malformed
/// source ids: a collision gets an occurrence suffix and a
/// `duplicate_row_id` count instead of dropping the row.
pub fn dispatch(
    handler: &dyn FormatHandler,
    records: &[Value],
    context: &IngestContext,
    sample_limit: usize,
) -> (Vec<NormalizedRow>, Diagnostics) {
    let mut diagnostics = Diagnostics::new(sample_limit);
    diagnostics.input_record_count = records.len();

    let mut rows: Vec<NormalizedRow> = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        match handler.transform(record, index, context, &mut diagnostics) {
            Ok(produced) => {
                if produced.is_empty() {
                    diagnostics.dropped_record_count += 1;
                    continue;
                }
                for mut row in produced {
                    if !seen_ids.insert(row.row_id.clone()) {
                        let original = row.row_id.clone();
                        let mut occurrence = 2u64;
                        while !seen_ids.insert(format!("{original}_{occurrence}")) {
                            occurrence += 1;
                        }
                        row.row_id = format!("{original}_{occurrence}");
                        warn!(
                            "duplicate row id '{}' from record {}; renamed to '{}'",
                            original, index, row.row_id
                        );
                        diagnostics.count(REASON_DUPLICATE_ROW_ID, &original);
                    }
                    rows.push(row);
                }
            }
            Err(err) => {
                warn!("record {} failed to transform: {:#}", index, err);
                diagnostics.count(REASON_TRANSFORM_FAILED, &index.to_string());
                diagnostics.dropped_record_count += 1;
            }
        }
    }

    diagnostics.output_row_count = rows.len();
    (rows, diagnostics)
}
