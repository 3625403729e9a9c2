//! Error type definitions for M3U ingestion
//!
//! Each component raises only its own error kind. `IngestError` is the single
//! aggregation point used by the ingestion coordinator and the playlist service.

use thiserror::Error;

/// Top-level ingestion error
///
/// Returned by `IngestionCoordinator::add_playlist` and the playlist service.
/// Use [`IngestError::description`] for the innermost human-readable message.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Network or transfer failure while fetching the playlist
    #[error("Transport error: {0}")]
    Transport(#[from] SourceError),

    /// The downloaded content is not a usable playlist
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// The persistence store rejected a commit
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Request validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },
}

/// Content fetching errors
///
/// These travel inside `DownloadProgress` events, so they carry rendered
/// messages instead of the underlying client error and are `Clone`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Connection or body read failure
    #[error("Transfer failed for {url}: {message}")]
    Transport { url: String, message: String },

    /// Non-success HTTP status from the server
    #[error("HTTP error: {status} - {url}")]
    Http { status: u16, url: String },

    /// No data arrived within the configured stall timeout
    #[error("Transfer stalled for {url}: no data for {seconds}s")]
    Stalled { url: String, seconds: u64 },

    /// The transfer was superseded by a newer fetch or dropped by its consumer
    #[error("Transfer cancelled: {url}")]
    Cancelled { url: String },

    /// A completed transfer reported no payload
    #[error("Playlist data is missing")]
    MissingPayload,

    /// The HTTP client could not be constructed
    #[error("HTTP client error: {message}")]
    Client { message: String },
}

/// Playlist content errors raised by the parser
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// No usable content lines after trimming
    #[error("Empty file")]
    EmptyFile,

    /// Undecodable content, or no channel entries extracted
    #[error("Invalid format")]
    InvalidFormat,
}

/// Persistence store errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A commit was rejected and its staged operations discarded
    #[error("Commit failed: {message}")]
    CommitFailed { message: String },

    /// Record not found
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },
}

impl IngestError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// The innermost human-readable message, without the category prefix
    pub fn description(&self) -> String {
        match self {
            Self::Transport(e) => e.to_string(),
            Self::Format(e) => e.to_string(),
            Self::Persistence(e) => e.to_string(),
            Self::Validation { message } => message.clone(),
        }
    }
}

impl SourceError {
    /// Create a transport error for a URL
    pub fn transport<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }
}

impl PersistenceError {
    /// Create a commit failure
    pub fn commit_failed<S: Into<String>>(message: S) -> Self {
        Self::CommitFailed {
            message: message.into(),
        }
    }

    pub fn not_found<R: Into<String>>(resource: R, id: uuid::Uuid) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_strips_category() {
        let err = IngestError::from(FormatError::InvalidFormat);
        assert_eq!(err.to_string(), "Format error: Invalid format");
        assert_eq!(err.description(), "Invalid format");

        let err = IngestError::from(SourceError::MissingPayload);
        assert_eq!(err.description(), "Playlist data is missing");
    }

    #[test]
    fn test_validation_description() {
        let err = IngestError::validation("Playlist name must not be empty");
        assert_eq!(err.description(), "Playlist name must not be empty");
    }
}
