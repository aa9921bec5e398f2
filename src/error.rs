//! Error types for the pagemark library.

use std::io;
use thiserror::Error;

/// Result type alias for pagemark operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during conversion.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The page source collaborator failed to deliver a page.
    #[error("Unreadable source: {0}")]
    UnreadableSource(String),

    /// The document has no pages or no text fragments at all.
    #[error("Empty document: no pages or fragments to classify")]
    EmptyDocument,

    /// Page-scoped classification failure. Recoverable: the pipeline
    /// degrades the affected page to an unstructured paragraph dump.
    #[error("Classification fault on page {page}: {reason}")]
    ClassificationFault {
        /// Zero-based index of the faulted page.
        page: u32,
        /// Human-readable cause.
        reason: String,
    },

    /// Configuration validation failure. Fatal before any page is processed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The caller cancelled the conversion between pages.
    #[error("Conversion cancelled")]
    Cancelled,

    /// Error while rendering the document tree to Markdown.
    #[error("Rendering error: {0}")]
    Render(String),

    /// Malformed fragment dump or configuration file.
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

impl Error {
    /// Whether this error aborts the whole document conversion.
    ///
    /// Page-scoped faults are recovered locally; everything else is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::ClassificationFault { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Deserialize(err.to_string())
    }
}
