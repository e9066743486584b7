use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::SOURCE_TYPE_KEY;

/// Row-level sentiment of a verbatim. Sources that carry no usable
/// sentiment fall back to `Neutral`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    /// Case-insensitive parse; anything unrecognized is `None` so callers
    /// pick their own fallback.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }
}

/// Topic-level sentiment; topics may additionally be tagged `any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicSentiment {
    Positive,
    Neutral,
    Negative,
    Any,
}

impl TopicSentiment {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            "any" => Some(Self::Any),
            _ => None,
        }
    }
}

/// A categorical tag attached to a verbatim.
///
/// Renderers key topics on `(category, label)`; `code` is informational and
/// not required to be unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub label: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<TopicSentiment>,
}

impl Topic {
    /// Validate and copy through a raw topic element. Unknown fields are
    /// dropped; a missing or empty `label` or `category` invalidates the
    /// element.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let label = obj.get("label")?.as_str()?.trim();
        let category = obj.get("category")?.as_str()?.trim();
        if label.is_empty() || category.is_empty() {
            return None;
        }
        Some(Self {
            label: label.to_string(),
            category: category.to_string(),
            code: obj.get("code").and_then(Value::as_u64),
            sentiment: obj
                .get("sentiment")
                .and_then(Value::as_str)
                .and_then(TopicSentiment::parse),
        })
    }
}

impl PartialEq for Topic {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category && self.label == other.label
    }
}

impl Eq for Topic {}

impl std::hash::Hash for Topic {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.category.hash(state);
        self.label.hash(state);
    }
}

/// The canonical unit every downstream renderer, search and prompt
/// consumes. Consumers may read any field and any `metadata` key but must
/// tolerate missing metadata keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    /// Stable identifier, unique within one ingestion result.
    pub row_id: String,
    /// The verbatim customer utterance; possibly empty, never absent.
    pub text: String,
    /// Topics in source order; possibly empty.
    pub topics: Vec<Topic>,
    pub sentiment: Sentiment,
    /// The question/axis this row answers: `primary` for single-dimension
    /// sources, the source's per-dimension key otherwise.
    pub dimension_ref: String,
    /// Human-readable label for `dimension_ref`; absent until enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_name: Option<String>,
    /// Source-specific fields under lower-snake-case keys; values are JSON
    /// scalars or arrays.
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl NormalizedRow {
    /// The business-context tag the producing handler declared.
    pub fn source_type(&self) -> Option<&str> {
        self.metadata.get(SOURCE_TYPE_KEY).and_then(Value::as_str)
    }
}
