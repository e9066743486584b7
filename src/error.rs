use thiserror::Error;

use crate::pipeline::processing::normalize::detect::PayloadFingerprint;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("no registered format matches payload ({fingerprint})")]
    UnknownFormat { fingerprint: PayloadFingerprint },

    #[error("unknown format tag: {tag}")]
    UnknownFormatTag { tag: String },

    #[error("duplicate format tag: {tag}")]
    DuplicateFormatTag { tag: String },

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
