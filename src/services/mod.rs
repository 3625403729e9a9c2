//! Playlist management on top of the ingestion coordinator and stores

pub mod playlist;

pub use playlist::PlaylistService;
