//! Playlist ingestion: the coordinator that drives fetch, parse and
//! persistence, and the progress slot it publishes to.

pub mod ingest_m3u;
pub mod state_manager;

pub use ingest_m3u::IngestionCoordinator;
pub use state_manager::IngestionStateManager;
