// Pipeline ingestion: the coordinator external callers use

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::constants::{DEFAULT_SAMPLE_LIMIT, REASON_EMPTY_RECORD};
use crate::domain::NormalizedRow;
use crate::error::Result;
use crate::pipeline::processing::enrich::enrich_dimension_names;
use crate::pipeline::processing::normalize::detect::{detect, first_non_empty_record, records_of};
use crate::pipeline::processing::normalize::dispatch::dispatch;
use crate::pipeline::processing::normalize::{Diagnostics, FormatRegistry, IngestContext};

/// Everything one upload produced: the matched format, the normalized rows
/// in source order, and drop accounting. Produced once per upload and
/// persisted immutably; reprocessing creates a new result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionResult {
    /// `None` only for the empty payload.
    pub format_tag: Option<String>,
    pub rows: Vec<NormalizedRow>,
    pub diagnostics: Diagnostics,
}

/// Per-call options for [`IngestionPipeline::ingest`].
#[derive(Clone, Default)]
pub struct IngestOptions {
    /// Skip detection and use the named handler directly.
    pub format_hint: Option<String>,
    pub context: IngestContext,
}

/// The public entry point. Owns the sealed format registry; construction
/// ends registration, after which concurrent ingestion of distinct
/// payloads is safe.
pub struct IngestionPipeline {
    registry: FormatRegistry,
    sample_limit: usize,
}

impl IngestionPipeline {
    /// Pipeline with the built-in handlers.
    pub fn new() -> Self {
        Self::with_registry(FormatRegistry::with_builtin())
    }

    /// Pipeline over a caller-assembled registry, custom handlers included.
    pub fn with_registry(registry: FormatRegistry) -> Self {
        Self {
            registry,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }

    /// Bound on originating-record ids kept per drop reason.
    pub fn with_sample_limit(mut self, sample_limit: usize) -> Self {
        self.sample_limit = sample_limit;
        self
    }

    /// Registered format tags, in recognition order.
    pub fn known_formats(&self) -> Vec<&'static str> {
        self.registry.tags()
    }

    /// The business source type a format tag writes into row metadata.
    pub fn source_type_of(&self, tag: &str) -> Result<&'static str> {
        Ok(self.registry.by_tag(tag)?.source_type())
    }

    /// Normalize one uploaded payload.
    ///
    /// Returns a complete result or one of the surfaced errors
    /// (`UnknownFormat`, `UnknownFormatTag`); per-record failures are
    /// reported through diagnostics and never abort. The empty payload
    /// yields an empty result with no format tag.
    pub fn ingest(&self, payload: &Value, options: &IngestOptions) -> Result<IngestionResult> {
        let records = records_of(payload);

        if first_non_empty_record(records).is_none() {
            let mut diagnostics = Diagnostics::new(self.sample_limit);
            diagnostics.input_record_count = records.len();
            for index in 0..records.len() {
                diagnostics.count(REASON_EMPTY_RECORD, &index.to_string());
                diagnostics.dropped_record_count += 1;
            }
            return Ok(IngestionResult {
                format_tag: None,
                rows: Vec::new(),
                diagnostics,
            });
        }

        let handler = match options.format_hint.as_deref() {
            Some(tag) => self.registry.by_tag(tag)?,
            None => detect(&self.registry, payload)?,
        };

        let (mut rows, diagnostics) =
            dispatch(handler, records, &options.context, self.sample_limit);
        enrich_dimension_names(&mut rows, &options.context);

        info!(
            "ingested payload: format={} records={} rows={} dropped={}",
            handler.tag(),
            diagnostics.input_record_count,
            diagnostics.output_row_count,
            diagnostics.dropped_record_count
        );

        Ok(IngestionResult {
            format_tag: Some(handler.tag().to_string()),
            rows,
            diagnostics,
        })
    }
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self::new()
    }
}
