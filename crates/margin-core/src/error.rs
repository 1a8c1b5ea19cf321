//! Error types for margin-core

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using margin-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in margin-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// A change date that does not match the RFC 3339 grammar, even after cleaning
    #[error("Malformed timestamp: {0}")]
    MalformedTimestamp(String),

    /// A note document whose structure could not be parsed
    #[error("Malformed note document {}: {reason}", path.display())]
    MalformedDocument { path: PathBuf, reason: String },

    /// The raw scan did not find a `<note-content>` fragment
    #[error("No note-content fragment found in note {0}")]
    MissingContentFragment(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Note markup that is not well-formed
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A guid that is not a valid UUID
    #[error("Invalid note guid: {0}")]
    InvalidGuid(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The remote sync service rejected or failed an operation
    #[error("Remote sync error: {0}")]
    Remote(String),

    /// A background worker panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Task(String),
}

impl Error {
    /// Whether this error aborts ingestion of a single document only.
    pub const fn is_document_failure(&self) -> bool {
        matches!(
            self,
            Self::MalformedTimestamp(_) | Self::MalformedDocument { .. } | Self::Io(_)
        )
    }
}
