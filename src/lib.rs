//! M3U playlist ingestion
//!
//! Downloads an M3U playlist over HTTP(S), parses it into channels and
//! channel groups, and stores the result transactionally, publishing one
//! composed progress value while it runs. A failed ingestion leaves nothing
//! behind in the store.

pub mod config;
pub mod database;
pub mod entities;
pub mod errors;
pub mod ingestor;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod services;
pub mod sources;
pub mod utils;

pub use errors::{IngestError, IngestResult};
pub use ingestor::{IngestionCoordinator, IngestionStateManager};
pub use services::PlaylistService;
