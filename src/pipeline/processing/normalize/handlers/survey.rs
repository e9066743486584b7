use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::constants::{
    metadata_key, ORIGINAL_ROW_ID_KEY, REASON_EMPTY_RECORD, REASON_EMPTY_REF, REF_KEY_KEY,
    REF_KEY_PREFIX, SOURCE_TYPE_KEY, SURVEY_FORMAT_TAG, SURVEY_SOURCE_TYPE,
};
use crate::domain::{NormalizedRow, Sentiment};
use crate::pipeline::processing::normalize::{Diagnostics, FormatHandler, IngestContext};

use super::{collect_topics, string_id};

/// Per-dimension keys in survey exports, e.g. `ref_q1`.
static REF_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^{REF_KEY_PREFIX}[A-Za-z0-9][A-Za-z0-9_-]*$")).unwrap()
});

const TEXT_FIELD: &str = "text";
const TOPICS_FIELD: &str = "topics";
const SENTIMENT_FIELD: &str = "sentiment_overall";
const ROW_ID_FIELD: &str = "row_id";

/// Nested, multi-dimension survey exports: one record per respondent, one
/// `ref_*` object per answered question. Each record fans out into one
/// normalized row per `ref_*` key, in source insertion order.
#[derive(Debug)]
pub struct SurveyMultiRefHandler;

impl SurveyMultiRefHandler {
    fn is_ref_key(key: &str) -> bool {
        REF_KEY.is_match(key)
    }

    /// A ref object is answerable when it carries any of text, topics, or
    /// an overall sentiment.
    fn has_content(ref_obj: &Map<String, Value>) -> bool {
        ref_obj
            .get(TEXT_FIELD)
            .and_then(Value::as_str)
            .map_or(false, |text| !text.trim().is_empty())
            || ref_obj
                .get(TOPICS_FIELD)
                .and_then(Value::as_array)
                .map_or(false, |topics| !topics.is_empty())
            || ref_obj.get(SENTIMENT_FIELD).and_then(Value::as_str).is_some()
    }
}

impl FormatHandler for SurveyMultiRefHandler {
    fn tag(&self) -> &'static str {
        SURVEY_FORMAT_TAG
    }

    fn source_type(&self) -> &'static str {
        SURVEY_SOURCE_TYPE
    }

    fn recognize(&self, record: &Value) -> bool {
        let Some(obj) = record.as_object() else {
            return false;
        };
        obj.iter().any(|(key, value)| {
            Self::is_ref_key(key)
                && value.as_object().map_or(false, |ref_obj| {
                    ref_obj.contains_key(TEXT_FIELD)
                        || ref_obj.contains_key(TOPICS_FIELD)
                        || ref_obj.contains_key(SENTIMENT_FIELD)
                })
        })
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

        if !obj.keys().any(|key| Self::is_ref_key(key)) {
            diagnostics.count(REASON_EMPTY_RECORD, &record_index.to_string());
            return Ok(Vec::new());
        }

        // Parent id: the record's own row_id, else its position. Positions
        // keep ingestion deterministic for sources without ids.
        let parent_id = obj
            .get(ROW_ID_FIELD)
            .and_then(string_id)
            .unwrap_or_else(|| record_index.to_string());

        // Record-level fields shared by every fanned-out row.
        let mut shared = Map::new();
        for (key, value) in obj {
            if Self::is_ref_key(key) || key == ROW_ID_FIELD || value.is_object() {
                continue;
            }
            shared.insert(metadata_key(key), value.clone());
        }

        let mut rows = Vec::new();
        for (key, value) in obj {
            if !Self::is_ref_key(key) {
                continue;
            }
            let row_id = format!("{parent_id}_{key}");
            let Some(ref_obj) = value.as_object() else {
                diagnostics.count(REASON_EMPTY_REF, &row_id);
                continue;
            };
            if !Self::has_content(ref_obj) {
                diagnostics.count(REASON_EMPTY_REF, &row_id);
                continue;
            }

            let topics = collect_topics(ref_obj.get(TOPICS_FIELD), &row_id, diagnostics);

            let mut metadata = shared.clone();
            metadata.insert(
                ORIGINAL_ROW_ID_KEY.to_string(),
                Value::String(parent_id.clone()),
            );
            metadata.insert(REF_KEY_KEY.to_string(), Value::String(key.clone()));
            metadata.insert(
                SOURCE_TYPE_KEY.to_string(),
                Value::String(SURVEY_SOURCE_TYPE.to_string()),
            );

            rows.push(NormalizedRow {
                row_id,
                text: ref_obj
                    .get(TEXT_FIELD)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                topics,
                sentiment: ref_obj
                    .get(SENTIMENT_FIELD)
                    .and_then(Value::as_str)
                    .and_then(Sentiment::parse)
                    .unwrap_or_default(),
                dimension_ref: key.clone(),
                dimension_name: None,
                metadata,
            });
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transform_one(record: Value) -> (Vec<NormalizedRow>, Diagnostics) {
        let mut diagnostics = Diagnostics::default();
        let rows = SurveyMultiRefHandler
            .transform(&record, 0, &IngestContext::default(), &mut diagnostics)
            .unwrap();
        (rows, diagnostics)
    }

    #[test]
    fn test_recognize_requires_a_ref_object_with_content_fields() {
        let handler = SurveyMultiRefHandler;
        assert!(handler.recognize(&json!({"ref_q1": {"text": "hi"}})));
        assert!(handler.recognize(&json!({"ref_q1": {"sentiment_overall": "positive"}})));
        assert!(!handler.recognize(&json!({"ref_q1": {"unrelated": true}})));
        assert!(!handler.recognize(&json!({"ref_q1": "not an object"})));
        assert!(!handler.recognize(&json!({"foo": "bar"})));
    }

    #[test]
    fn test_record_fans_out_one_row_per_ref_in_source_order() {
        let (rows, _) = transform_one(json!({
            "row_id": "ro_abc",
            "created_at": "2022-03-27",
            "ref_q1": {"text": "I wanted to get fitter", "sentiment_overall": "positive",
                       "topics": [{"label": "fitness", "category": "GOAL", "code": 1}]},
            "ref_q2": {"text": "Yes", "sentiment_overall": "positive",
                       "topics": [{"label": "Yes", "category": "YES", "code": 2}]},
            "ref_q3": {"text": "Very satisfied", "sentiment_overall": "positive",
                       "topics": [{"label": "satisfied", "category": "SATISFACTION", "code": 3}]}
        }));

        assert_eq!(rows.len(), 3);
        let ids: Vec<&str> = rows.iter().map(|r| r.row_id.as_str()).collect();
        assert_eq!(ids, vec!["ro_abc_ref_q1", "ro_abc_ref_q2", "ro_abc_ref_q3"]);
        for (row, ref_key) in rows.iter().zip(["ref_q1", "ref_q2", "ref_q3"]) {
            assert_eq!(row.dimension_ref, ref_key);
            assert_eq!(row.sentiment, Sentiment::Positive);
            assert_eq!(row.metadata[ORIGINAL_ROW_ID_KEY], json!("ro_abc"));
            assert_eq!(row.metadata[REF_KEY_KEY], json!(ref_key));
            assert_eq!(row.metadata["created_at"], json!("2022-03-27"));
            assert_eq!(row.metadata[SOURCE_TYPE_KEY], json!(SURVEY_SOURCE_TYPE));
        }
    }

    #[test]
    fn test_empty_ref_is_dropped_and_counted() {
        let (rows, diagnostics) = transform_one(json!({
            "row_id": "ro_1",
            "ref_a": {"text": "works great", "sentiment_overall": "positive"},
            "ref_b": {},
        }));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_id, "ro_1_ref_a");
        assert_eq!(diagnostics.reason_count(REASON_EMPTY_REF), 1);
        assert_eq!(diagnostics.samples[REASON_EMPTY_REF], vec!["ro_1_ref_b"]);
    }

    #[test]
    fn test_record_without_refs_is_dropped_as_empty_record() {
        let (rows, diagnostics) = transform_one(json!({
            "index": 1,
            "text  Text Text": "flat record",
            "text  Topics": [],
        }));
        assert!(rows.is_empty());
        assert_eq!(diagnostics.reason_count(REASON_EMPTY_RECORD), 1);
    }

    #[test]
    fn test_record_without_row_id_uses_its_position() {
        let mut diagnostics = Diagnostics::default();
        let record = json!({"ref_q1": {"text": "hello"}});
        let rows = SurveyMultiRefHandler
            .transform(&record, 4, &IngestContext::default(), &mut diagnostics)
            .unwrap();
        assert_eq!(rows[0].row_id, "4_ref_q1");
        assert_eq!(rows[0].metadata[ORIGINAL_ROW_ID_KEY], json!("4"));
    }

    #[test]
    fn test_ref_with_empty_text_but_topics_is_kept() {
        let (rows, _) = transform_one(json!({
            "row_id": "ro_2",
            "ref_q1": {"text": "", "topics": [{"label": "fitness", "category": "GOAL"}]},
        }));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "");
        assert_eq!(rows[0].topics.len(), 1);
    }
}
