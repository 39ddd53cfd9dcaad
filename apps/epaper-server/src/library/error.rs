//! Library error types
//!
//! Failure kinds of the catalog and thumbnail core. Mapping to HTTP status
//! codes happens in the transport layer.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    /// Id not present in the current catalog snapshot
    #[error("Unknown document id: {0}")]
    UnknownId(String),

    /// Id is in the catalog but its file is gone from disk
    #[error("File for document {id} missing on disk: {}", path.display())]
    MissingFile { id: String, path: PathBuf },

    /// Document exists but has no sidecar descriptor
    #[error("No descriptor for document: {0}")]
    DescriptorNotFound(String),

    /// Sidecar descriptor exists but could not be read or parsed
    #[error("Failed to load descriptor {}: {reason}", path.display())]
    DescriptorLoad { path: PathBuf, reason: String },

    /// Rendering, normalizing or writing a thumbnail failed
    #[error("Thumbnail generation failed: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, LibraryError>;
