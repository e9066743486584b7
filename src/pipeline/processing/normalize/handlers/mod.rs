// Built-in source format handlers

pub mod intercom;
pub mod survey;

pub use intercom::IntercomMrtHandler;
pub use survey::SurveyMultiRefHandler;

use serde_json::Value;

use crate::constants::REASON_INVALID_TOPIC;
use crate::domain::Topic;

use super::dispatch::Diagnostics;

/// Validate and copy through a raw `topics` array. Elements missing a
/// label or category are dropped and counted under `invalid_topic`.
pub(crate) fn collect_topics(
    raw: Option<&Value>,
    record_ref: &str,
    diagnostics: &mut Diagnostics,
) -> Vec<Topic> {
    let Some(elements) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut topics = Vec::with_capacity(elements.len());
    for element in elements {
        match Topic::from_value(element) {
            Some(topic) => topics.push(topic),
            None => diagnostics.count(REASON_INVALID_TOPIC, record_ref),
        }
    }
    topics
}

/// Coerce a source id value (string or number) to a string id.
pub(crate) fn string_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
