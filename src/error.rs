//! Error types for fitforge

use thiserror::Error;

/// Errors that can occur during import or export.
///
/// Individual missing metrics or series channels are never errors; they are
/// silently omitted during normalization. Everything here is scoped to a
/// single import/export attempt.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Unsupported source shape: {0}")]
    UnsupportedShape(String),
}
