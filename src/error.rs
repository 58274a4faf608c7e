//! Error types for entity extraction and export.

use thiserror::Error;

/// Result type alias for entity operations
pub type Result<T> = std::result::Result<T, EntityError>;

/// Errors that can occur while parsing submissions or exporting entities.
#[derive(Error, Debug)]
pub enum EntityError {
    /// Failed to open, read or write a file or stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON configuration or record error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML syntax error reported by the reader
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// XML that is well-formed token by token but structurally broken
    #[error("Malformed submission XML: {message}")]
    MalformedXml { message: String },

    /// Entity record that cannot be formatted
    #[error("Invalid entity at row {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    /// Entity record lacking a system field required for export
    #[error("Entity is missing required system field '{field}'")]
    MissingField { field: &'static str },

    /// Bad command line
    #[error("{0}")]
    Usage(String),
}

impl From<quick_xml::events::attributes::AttrError> for EntityError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        EntityError::Xml(err.into())
    }
}
