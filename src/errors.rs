//! Error types for the notekit library.
//!
//! This module defines the error type shared by note content conversion,
//! web archive generation and the service mapping layer.

use std::io;

use thiserror::Error;

/// The main error type for notekit.
#[derive(Error, Debug)]
pub enum NoteError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors related to zip operations.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Note content is not usable as ENML.
    #[error("Invalid note content: {message}")]
    InvalidContent { message: String },

    /// The HTML rewriter rejected the markup it was given.
    #[error("Markup rewrite failed: {message}")]
    Rewrite { message: String },

    /// A resource referenced by hash is not attached to the note.
    #[error("Resource not found: {hash}")]
    ResourceNotFound { hash: String },

    /// A web archive could not be read back.
    #[error("Invalid web archive: {message}")]
    ArchiveFormat { message: String },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A background generation task panicked or was cancelled.
    #[error("Background task failed: {message}")]
    TaskFailed { message: String },

    /// Tag name rejected by the service limits.
    #[error("Invalid tag name: {name:?}")]
    InvalidTag { name: String },

    /// file not found
    #[error("File not found: {file_path}")]
    FileNotFound { file_path: String },
}

impl From<lol_html::errors::RewritingError> for NoteError {
    fn from(e: lol_html::errors::RewritingError) -> Self {
        NoteError::Rewrite {
            message: e.to_string(),
        }
    }
}
