/// Format tags, source-type labels and source column conventions shared
/// across the pipeline. Handlers and tests both key off these so the names
/// stay consistent in one place.

// Structural format tags (stable registry identifiers)
pub const INTERCOM_FORMAT_TAG: &str = "intercom_mrt";
pub const SURVEY_FORMAT_TAG: &str = "survey_multi_ref";

// Business source types written into row metadata
pub const INTERCOM_SOURCE_TYPE: &str = "intercom";
pub const SURVEY_SOURCE_TYPE: &str = "survey";

/// Dimension reference used by single-dimension sources.
pub const PRIMARY_DIMENSION: &str = "primary";

// Column conventions of flat conversation exports: `<stem>Topics`,
// `<stem>Text Text`, `<stem>Overall Sentiment`
pub const TOPICS_COLUMN_SUFFIX: &str = "Topics";
pub const TEXT_COLUMN_SUFFIX: &str = "Text Text";
pub const TEXT_COLUMN_MARKER: &str = "Text";
pub const SENTIMENT_COLUMN_SUFFIX: &str = "Overall Sentiment";
pub const METADATA_COLUMN_PREFIX: &str = "Additional columns ";

/// Per-dimension keys in survey exports look like `ref_q1`, `ref_q2`, ...
pub const REF_KEY_PREFIX: &str = "ref_";

// Reserved metadata keys
pub const SOURCE_TYPE_KEY: &str = "source_type";
pub const ORIGINAL_ROW_ID_KEY: &str = "original_row_id";
pub const REF_KEY_KEY: &str = "ref_key";

// Diagnostics reason tags
pub const REASON_INVALID_TOPIC: &str = "invalid_topic";
pub const REASON_EMPTY_RECORD: &str = "empty_record";
pub const REASON_EMPTY_REF: &str = "empty_ref";
pub const REASON_TRANSFORM_FAILED: &str = "transform_failed";
pub const REASON_DUPLICATE_ROW_ID: &str = "duplicate_row_id";

/// How many originating record ids are kept per drop reason.
pub const DEFAULT_SAMPLE_LIMIT: usize = 10;

/// Derive a lower-snake-case metadata key from a source column name.
pub fn metadata_key(column: &str) -> String {
    column.trim().to_lowercase().replace([' ', '-'], "_")
}
