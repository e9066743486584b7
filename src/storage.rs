use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::domain::NormalizedRow;
use crate::error::Result;
use crate::pipeline::ingestion::IngestionResult;

/// Stored upload: the original payload kept verbatim next to its
/// normalized rows. The store never mutates a record; reprocessing an
/// upload creates a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub id: Uuid,
    pub name: String,
    pub raw_data: Value,
    pub normalized_data: Vec<NormalizedRow>,
    pub source_format: Option<String>,
    pub source_type: Option<String>,
    pub is_normalized: bool,
    /// Hex SHA-256 of the raw payload, for upload dedupe and audits.
    pub raw_checksum: String,
    pub created_at: DateTime<Utc>,
}

impl DataSource {
    pub fn from_ingestion(
        name: impl Into<String>,
        raw_data: Value,
        result: &IngestionResult,
        source_type: Option<String>,
    ) -> Self {
        let raw_checksum = checksum_of(&raw_data);
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_normalized: !result.rows.is_empty(),
            normalized_data: result.rows.clone(),
            source_format: result.format_tag.clone(),
            source_type,
            raw_data,
            raw_checksum,
            created_at: Utc::now(),
        }
    }

    /// Client-facing view honoring the legacy field contract: callers that
    /// historically read `raw_data` receive the normalized rows there once
    /// normalization exists, unless they ask for the original with
    /// `use_raw`.
    pub fn client_view(&self, use_raw: bool) -> Result<Value> {
        let mut view = serde_json::to_value(self)?;
        if self.is_normalized && !use_raw {
            view["raw_data"] = serde_json::to_value(&self.normalized_data)?;
        }
        Ok(view)
    }
}

/// Hex SHA-256 over the compact JSON encoding.
pub fn checksum_of(value: &Value) -> String {
    hex::encode(Sha256::digest(value.to_string().as_bytes()))
}

/// Storage seam for persisted uploads.
#[async_trait]
pub trait DataSourceStore: Send + Sync {
    async fn put(&self, source: &DataSource) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<DataSource>>;
    async fn list(&self) -> Result<Vec<DataSource>>;
}

/// In-memory store for development and testing.
pub struct InMemoryDataSourceStore {
    sources: Arc<Mutex<HashMap<Uuid, DataSource>>>,
}

impl InMemoryDataSourceStore {
    pub fn new() -> Self {
        Self {
            sources: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryDataSourceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSourceStore for InMemoryDataSourceStore {
    async fn put(&self, source: &DataSource) -> Result<()> {
        let mut sources = self.sources.lock().unwrap();
        sources.insert(source.id, source.clone());
        debug!("Stored data source '{}' with id {}", source.name, source.id);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DataSource>> {
        let sources = self.sources.lock().unwrap();
        Ok(sources.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<DataSource>> {
        let sources = self.sources.lock().unwrap();
        let mut all: Vec<DataSource> = sources.values().cloned().collect();
        all.sort_by_key(|source| source.created_at);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ingestion::{IngestOptions, IngestionPipeline};
    use serde_json::json;

    fn ingested() -> (Value, IngestionResult) {
        let payload = json!([{
            "index": 1,
            "text  Text Text": "What is the price?",
            "text  Topics": [{"label": "Pricing", "category": "BOOKING", "code": 30}],
        }]);
        let result = IngestionPipeline::new()
            .ingest(&payload, &IngestOptions::default())
            .unwrap();
        (payload, result)
    }

    #[test]
    fn test_client_view_serves_normalized_rows_under_raw_data() {
        let (payload, result) = ingested();
        let source = DataSource::from_ingestion(
            "chats.json",
            payload.clone(),
            &result,
            Some("intercom".to_string()),
        );
        assert!(source.is_normalized);

        let view = source.client_view(false).unwrap();
        assert_eq!(
            view["raw_data"],
            serde_json::to_value(&result.rows).unwrap()
        );

        let raw_view = source.client_view(true).unwrap();
        assert_eq!(raw_view["raw_data"], payload);
    }

    #[test]
    fn test_checksum_is_stable_for_equal_payloads() {
        let a = json!({"index": 1, "text": "hello"});
        let b = json!({"index": 1, "text": "hello"});
        assert_eq!(checksum_of(&a), checksum_of(&b));
        assert_ne!(checksum_of(&a), checksum_of(&json!({"index": 2})));
    }

    #[tokio::test]
    async fn test_in_memory_store_round_trip() {
        let (payload, result) = ingested();
        let source = DataSource::from_ingestion("chats.json", payload, &result, None);
        let store = InMemoryDataSourceStore::new();

        store.put(&source).await.unwrap();
        let fetched = store.get(source.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "chats.json");
        assert_eq!(fetched.normalized_data.len(), 1);

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }
}
