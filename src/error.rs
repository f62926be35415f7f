use std::path::PathBuf;
use thiserror::Error;

/// The main error type for speakleash operations.
#[derive(Debug, Error)]
pub enum SpeakleashError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest for language '{lang}' is unavailable: {message}")]
    ManifestUnavailable { lang: String, message: String },

    #[error("Replication of dataset '{dataset}' failed: {message}")]
    ReplicationFailed { dataset: String, message: String },

    #[error("Dataset not found: '{name}'")]
    DatasetNotFound { name: String },

    #[error("Malformed record in dataset '{dataset}' at line {line}: {source}")]
    RecordDecode {
        dataset: String,
        line: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record in dataset '{dataset}' at line {line} exceeds {limit} bytes")]
    RecordTooLong { dataset: String, line: u64, limit: usize },

    #[error("Failed to parse config from {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Category list for language '{lang}' is unavailable: {message}")]
    CategoriesUnavailable { lang: String, message: String },

    #[error("Samples for dataset '{dataset}' are unavailable: {message}")]
    SamplesUnavailable { dataset: String, message: String },

    #[error("Invalid sample parameters: {message}")]
    InvalidSampleParams { message: String },
}

impl SpeakleashError {
    pub(crate) fn replication(dataset: &str, message: impl Into<String>) -> Self {
        Self::ReplicationFailed {
            dataset: dataset.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn manifest(lang: &str, message: impl Into<String>) -> Self {
        Self::ManifestUnavailable {
            lang: lang.to_string(),
            message: message.into(),
        }
    }
}
