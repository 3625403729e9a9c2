//! Centralized error handling for M3U ingestion
//!
//! # Error Categories
//!
//! - **Source Errors**: network failures while fetching a playlist
//! - **Format Errors**: empty or unparseable playlist content
//! - **Persistence Errors**: store commit failures
//! - **Ingest Errors**: the aggregate returned to callers of the coordinator
//!
//! # Usage
//!
//! ```rust
//! use m3u_ingest::errors::{FormatError, IngestError, IngestResult};
//!
//! fn example_function() -> IngestResult<()> {
//!     Err(FormatError::EmptyFile.into())
//! }
//!
//! let err = example_function().unwrap_err();
//! assert_eq!(err.description(), "Empty file");
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using IngestError
pub type IngestResult<T> = Result<T, IngestError>;

/// Convenience type alias for parser Results
pub type FormatResult<T> = Result<T, FormatError>;

/// Convenience type alias for store Results
pub type PersistenceResult<T> = Result<T, PersistenceError>;
