use anyhow::{bail, Result};
use serde_json::{Map, Value};

use crate::constants::{
    metadata_key, INTERCOM_FORMAT_TAG, INTERCOM_SOURCE_TYPE, METADATA_COLUMN_PREFIX,
    PRIMARY_DIMENSION, REASON_EMPTY_RECORD, SENTIMENT_COLUMN_SUFFIX, SOURCE_TYPE_KEY,
    TEXT_COLUMN_MARKER, TEXT_COLUMN_SUFFIX, TOPICS_COLUMN_SUFFIX,
};
use crate::domain::{NormalizedRow, Sentiment};
use crate::pipeline::processing::normalize::{Diagnostics, FormatHandler, IngestContext};

use super::{collect_topics, string_id};

/// Flat, single-dimension conversation exports (Intercom-style MRT dumps).
///
/// Columns follow the export convention `<stem>Topics`, `<stem>Text Text`
/// and `<stem>Overall Sentiment`; extra columns are prefixed
/// `Additional columns ` and carried into row metadata.
#[derive(Debug)]
pub struct IntercomMrtHandler;

impl IntercomMrtHandler {
    /// The topics column and its stem, e.g. `"text  Topics"` → `"text  "`.
    fn topics_column(record: &Map<String, Value>) -> Option<(&String, &str)> {
        record.iter().find_map(|(key, value)| {
            let stem = key.strip_suffix(TOPICS_COLUMN_SUFFIX)?;
            value.as_array().map(|_| (key, stem))
        })
    }

    /// The verbatim-text column sharing `stem`: the exact
    /// `<stem>Text Text` convention when present, else any sibling text
    /// column on the same stem.
    fn text_column<'a>(record: &'a Map<String, Value>, stem: &str) -> Option<&'a String> {
        let exact = format!("{stem}{TEXT_COLUMN_SUFFIX}");
        if let Some((key, _)) = record
            .iter()
            .find(|(key, value)| key.as_str() == exact && value.is_string())
        {
            return Some(key);
        }
        record.iter().find_map(|(key, value)| {
            let suffix = key.strip_prefix(stem)?;
            (value.is_string() && suffix.contains(TEXT_COLUMN_MARKER)).then_some(key)
        })
    }
}

impl FormatHandler for IntercomMrtHandler {
    fn tag(&self) -> &'static str {
        INTERCOM_FORMAT_TAG
    }

    fn source_type(&self) -> &'static str {
        INTERCOM_SOURCE_TYPE
    }

    fn recognize(&self, record: &Value) -> bool {
        let Some(obj) = record.as_object() else {
            return false;
        };
        // Flat mapping only: nested per-dimension objects belong to the
        // survey family.
        if obj.values().any(Value::is_object) {
            return false;
        }
        match Self::topics_column(obj) {
            Some((_, stem)) => Self::text_column(obj, stem).is_some(),
            None => false,
        }
    }

    fn transform(
        &self,
        record: &Value,
        record_index: usize,
        _context: &IngestContext,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<NormalizedRow>> {
        let Some(obj) = record.as_object() else {
            bail!("record {} is not a JSON object", record_index);
        };

        let row_id = obj
            .get("index")
            .and_then(string_id)
            .or_else(|| obj.get("id").and_then(string_id))
            .unwrap_or_else(|| record_index.to_string());

        let columns = Self::topics_column(obj);
        let topics = match columns {
            Some((topics_key, _)) => collect_topics(obj.get(topics_key), &row_id, diagnostics),
            None => Vec::new(),
        };
        let text = columns
            .and_then(|(_, stem)| Self::text_column(obj, stem))
            .and_then(|key| obj.get(key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if text.is_empty() && topics.is_empty() {
            diagnostics.count(REASON_EMPTY_RECORD, &row_id);
            return Ok(Vec::new());
        }

        let sentiment = columns
            .map(|(_, stem)| format!("{stem}{SENTIMENT_COLUMN_SUFFIX}"))
            .and_then(|key| obj.get(&key))
            .and_then(Value::as_str)
            .and_then(Sentiment::parse)
            .unwrap_or_default();

        let mut metadata = Map::new();
        for (key, value) in obj {
            let Some(column) = key.strip_prefix(METADATA_COLUMN_PREFIX) else {
                continue;
            };
            if value.is_object() {
                continue;
            }
            metadata.insert(metadata_key(column), value.clone());
        }
        metadata.insert(
            SOURCE_TYPE_KEY.to_string(),
            Value::String(INTERCOM_SOURCE_TYPE.to_string()),
        );

        Ok(vec![NormalizedRow {
            row_id,
            text,
            topics,
            sentiment,
            dimension_ref: PRIMARY_DIMENSION.to_string(),
            dimension_name: None,
            metadata,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::REASON_INVALID_TOPIC;
    use serde_json::json;

    fn transform_one(record: Value) -> (Vec<NormalizedRow>, Diagnostics) {
        let mut diagnostics = Diagnostics::default();
        let rows = IntercomMrtHandler
            .transform(&record, 0, &IngestContext::default(), &mut diagnostics)
            .unwrap();
        (rows, diagnostics)
    }

    #[test]
    fn test_recognize_requires_topics_and_text_columns() {
        let handler = IntercomMrtHandler;
        assert!(handler.recognize(&json!({
            "text  Text Text": "hello",
            "text  Topics": [],
        })));
        assert!(!handler.recognize(&json!({"foo": "bar"})));
        // Nested per-dimension objects are not this family
        assert!(!handler.recognize(&json!({
            "text  Text Text": "hello",
            "text  Topics": [],
            "ref_q1": {"text": "hi"},
        })));
    }

    #[test]
    fn test_transform_flat_record() {
        let (rows, _) = transform_one(json!({
            "index": 1,
            "text  Text Text": "What is the price?",
            "text  Topics": [{"label": "Pricing", "category": "BOOKING", "code": 30}],
            "text  Overall Sentiment": "neutral",
            "Additional columns location_country": "UK"
        }));

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.row_id, "1");
        assert_eq!(row.text, "What is the price?");
        assert_eq!(row.sentiment, Sentiment::Neutral);
        assert_eq!(row.dimension_ref, PRIMARY_DIMENSION);
        assert_eq!(row.topics.len(), 1);
        assert_eq!(row.topics[0].label, "Pricing");
        assert_eq!(row.metadata["location_country"], json!("UK"));
        assert_eq!(row.metadata[SOURCE_TYPE_KEY], json!(INTERCOM_SOURCE_TYPE));
    }

    #[test]
    fn test_missing_text_with_topics_yields_empty_text_row() {
        let (rows, diagnostics) = transform_one(json!({
            "index": 7,
            "text  Topics": [{"label": "Pricing", "category": "BOOKING"}],
        }));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "");
        assert_eq!(diagnostics.reason_count(REASON_EMPTY_RECORD), 0);
    }

    #[test]
    fn test_record_without_text_or_topics_is_dropped() {
        let (rows, diagnostics) = transform_one(json!({
            "index": 3,
            "text  Topics": [],
        }));
        assert!(rows.is_empty());
        assert_eq!(diagnostics.reason_count(REASON_EMPTY_RECORD), 1);
        assert_eq!(diagnostics.samples[REASON_EMPTY_RECORD], vec!["3"]);
    }

    #[test]
    fn test_invalid_sentiment_defaults_to_neutral() {
        let (rows, _) = transform_one(json!({
            "index": 4,
            "text  Text Text": "fine",
            "text  Topics": [],
            "text  Overall Sentiment": "ecstatic",
        }));
        assert_eq!(rows[0].sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_invalid_topics_are_dropped_and_counted() {
        let (rows, diagnostics) = transform_one(json!({
            "index": 5,
            "text  Text Text": "hello",
            "text  Topics": [
                {"label": "Pricing", "category": "BOOKING"},
                {"label": "no category"},
            ],
        }));
        assert_eq!(rows[0].topics.len(), 1);
        assert_eq!(diagnostics.reason_count(REASON_INVALID_TOPIC), 1);
    }
}
