//! Error kinds surfaced by uploads, classification, and configuration.
//!
//! Every failure that reaches a caller leaves prior session state untouched.
//! [`ViewerError::UnsupportedGeometry`] and [`ViewerError::QueryFailure`] are
//! logged and recovered from inside the pipeline; they only escape when a
//! caller asks for them directly (for example [`crate::geometry::convert_strict`]).

use thiserror::Error;

pub type ViewerResult<T> = std::result::Result<T, ViewerError>;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Unsupported file type for '{name}': expected .zip, .json, or .geojson")]
    InvalidFileType { name: String },

    #[error("File '{name}' is {size} bytes, which exceeds the {limit} byte upload limit")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unsupported geometry type '{0}'")]
    UnsupportedGeometry(String),

    #[error("Attribute query against layer {layer} failed: {reason}")]
    QueryFailure { layer: u64, reason: String },

    #[error("Cannot classify: {0}")]
    ClassificationPrecondition(String),

    #[error("Layer {0} is not registered with this session")]
    UnknownLayer(u64),

    #[error("Feature service failed: {0}")]
    ServiceFailure(String),

    #[error("Unknown palette '{0}'")]
    UnknownPalette(String),

    #[error("Invalid color '{value}': {reason}")]
    InvalidColor { value: String, reason: String },
}

impl ViewerError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ViewerError::MalformedInput(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        ViewerError::ClassificationPrecondition(message.into())
    }

    /// Errors that are logged and absorbed rather than aborting an operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ViewerError::UnsupportedGeometry(_) | ViewerError::QueryFailure { .. }
        )
    }
}

impl From<serde_json::Error> for ViewerError {
    fn from(err: serde_json::Error) -> Self {
        ViewerError::MalformedInput(format!("JSON parse failure: {err}"))
    }
}
