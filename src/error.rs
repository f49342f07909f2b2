use std::io;

use thiserror::Error;

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Failures surfaced by the ingest and reconciliation entry points.
///
/// Data-quality problems are never reported through this type; they travel as
/// [`crate::csv_import::ValidationReport`] values instead.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Input too malformed to yield any rows or field groups.
    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Match index {index} is out of range for {len} result(s)")]
    MatchIndex { index: usize, len: usize },

    #[error("Failed to decode text with encoding {encoding}")]
    Decode { encoding: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CatalogError {
    pub fn parse(message: impl Into<String>) -> Self {
        CatalogError::Parse {
            message: message.into(),
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, CatalogError::Parse { .. })
    }
}
