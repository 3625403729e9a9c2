//! Playlist stores
//!
//! Both stores implement [`PersistenceStore`] for ingestion and
//! [`PlaylistQueries`] for reading committed data back.
//!
//! ```rust
//! use m3u_ingest::models::Playlist;
//! use m3u_ingest::repositories::{MemoryPlaylistStore, PersistenceStore, PlaylistQueries};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryPlaylistStore::new();
//! let playlist = Playlist::new("Example", Url::parse("http://example.com/list.m3u")?);
//! store.insert(playlist.clone().into());
//! store.commit().await?;
//! assert_eq!(store.list_playlists().await?, vec![playlist]);
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod seaorm;
pub mod traits;

pub use memory::{MemoryPlaylistStore, StoreCounts};
pub use seaorm::SeaOrmPlaylistStore;
pub use traits::{
    EntityKind, EntityRef, PersistenceStore, PlaylistQueries, StagedOperation, StagedOperations,
    StoredEntity,
};
