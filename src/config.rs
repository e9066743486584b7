use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::constants::DEFAULT_SAMPLE_LIMIT;
use crate::error::{IngestError, Result};
use crate::pipeline::processing::normalize::DimensionNameLookup;

/// Crate configuration, read from a TOML file.
///
/// ```toml
/// [ingest]
/// sample_limit = 10
///
/// [dimension_names.ds_fitness_survey]
/// ref_q1 = "What is your goal?"
/// ref_q2 = "Did you reach it?"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestSettings,
    /// data source id → dimension ref → human-readable label
    #[serde(default)]
    pub dimension_names: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestSettings {
    /// How many originating record ids are kept per drop reason.
    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }
}

fn default_sample_limit() -> usize {
    DEFAULT_SAMPLE_LIMIT
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// An explicit path must exist; the implicit `config.toml` is optional.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let implicit = Path::new("config.toml");
                if implicit.exists() {
                    Self::load(implicit)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Enricher lookup backed by the `[dimension_names]` tables.
    pub fn dimension_table(&self) -> DimensionNameTable {
        DimensionNameTable {
            names: self.dimension_names.clone(),
        }
    }
}

/// TOML-backed [`DimensionNameLookup`].
#[derive(Debug, Clone, Default)]
pub struct DimensionNameTable {
    names: BTreeMap<String, BTreeMap<String, String>>,
}

impl DimensionNameLookup for DimensionNameTable {
    fn dimension_name(&self, data_source_id: &str, dimension_ref: &str) -> Option<String> {
        self.names.get(data_source_id)?.get(dimension_ref).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parses_dimension_names() {
        let config: Config = toml::from_str(
            r#"
            [ingest]
            sample_limit = 3

            [dimension_names.ds_1]
            ref_q1 = "What is your goal?"
            "#,
        )
        .unwrap();

        assert_eq!(config.ingest.sample_limit, 3);
        let table = config.dimension_table();
        assert_eq!(
            table.dimension_name("ds_1", "ref_q1").as_deref(),
            Some("What is your goal?")
        );
        assert_eq!(table.dimension_name("ds_1", "ref_q2"), None);
        assert_eq!(table.dimension_name("ds_2", "ref_q1"), None);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.ingest.sample_limit, DEFAULT_SAMPLE_LIMIT);
        assert!(config.dimension_names.is_empty());
    }

    #[test]
    fn test_load_reads_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[ingest]\nsample_limit = 5\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.ingest.sample_limit, 5);

        assert!(Config::load(&dir.path().join("missing.toml")).is_err());
    }
}
