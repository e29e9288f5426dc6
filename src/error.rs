// src/error.rs

use thiserror::Error;

/// Core error types for modloom
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed XML in a manifest, modlist or activation file
    #[error("XML parse error: {0}")]
    Xml(String),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An ordering policy table failed validation
    #[error("Invalid ordering policy: {0}")]
    InvalidPolicy(String),

    /// A modlist file whose format could not be recognized
    #[error("Unrecognized modlist format: {0}")]
    UnknownFormat(String),

    /// A modlist file that was recognized but held nothing usable
    #[error("Import failed: {0}")]
    ImportError(String),

    /// Writing the activation file failed at the final rename
    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

/// Result type alias using modloom's Error type
pub type Result<T> = std::result::Result<T, Error>;
