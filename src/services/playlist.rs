//! Playlist service
//!
//! Adds playlists through the ingestion coordinator and manages the stored
//! ones: listing, renaming, changing the source URL and deleting.

use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{IngestError, IngestResult, PersistenceError};
use crate::ingestor::{IngestionCoordinator, IngestionStateManager};
use crate::models::{
    CreatePlaylistRequest, Playlist, PlaylistChannel, PlaylistChannelGroup, PlaylistUpdateRequest,
};
use crate::repositories::{EntityRef, PersistenceStore, PlaylistQueries, StoredEntity};
use crate::sources::{ContentFetcher, HttpContentFetcher, M3uParser, PlaylistParser};
use crate::utils::url::UrlUtils;

pub struct PlaylistService<F, P, S> {
    coordinator: IngestionCoordinator<F, P, S>,
    store: Arc<S>,
}

impl<S> PlaylistService<HttpContentFetcher, M3uParser, S>
where
    S: PersistenceStore + PlaylistQueries,
{
    /// Service with the HTTP fetcher and M3U parser configured from `config`
    pub fn from_config(config: &Config, store: Arc<S>) -> IngestResult<Self> {
        let fetcher = HttpContentFetcher::new(&config.http)?;
        let parser = M3uParser::from_config(&config.ingestion);
        Ok(Self::new(IngestionCoordinator::with_config(
            fetcher,
            parser,
            store,
            &config.ingestion,
        )))
    }
}

impl<F, P, S> PlaylistService<F, P, S>
where
    F: ContentFetcher,
    P: PlaylistParser,
    S: PersistenceStore + PlaylistQueries,
{
    pub fn new(coordinator: IngestionCoordinator<F, P, S>) -> Self {
        let store = coordinator.store().clone();
        Self { coordinator, store }
    }

    /// Progress of the ingestion currently running, if any
    pub fn progress(&self) -> &IngestionStateManager {
        self.coordinator.state_manager()
    }

    /// Validate the input, then download, parse and store the playlist
    pub async fn add_playlist(&mut self, name: &str, url: &str) -> IngestResult<Playlist> {
        let request = CreatePlaylistRequest::new(name, url)?;
        self.coordinator.add_playlist(request).await
    }

    pub async fn list_playlists(&self) -> IngestResult<Vec<Playlist>> {
        Ok(self.store.list_playlists().await?)
    }

    pub async fn get_playlist(&self, id: Uuid) -> IngestResult<Playlist> {
        self.store
            .find_playlist(id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("playlist", id).into())
    }

    pub async fn channels(&self, playlist_id: Uuid) -> IngestResult<Vec<PlaylistChannel>> {
        Ok(self.store.channels_for_playlist(playlist_id).await?)
    }

    pub async fn groups(&self, playlist_id: Uuid) -> IngestResult<Vec<PlaylistChannelGroup>> {
        Ok(self.store.groups_for_playlist(playlist_id).await?)
    }

    pub async fn rename_playlist(&self, id: Uuid, name: &str) -> IngestResult<Playlist> {
        self.update_playlist(
            id,
            PlaylistUpdateRequest {
                name: Some(name.to_string()),
                url: None,
            },
        )
        .await
    }

    /// Change the name and/or source URL. Stored channels are kept as they are.
    pub async fn update_playlist(
        &self,
        id: Uuid,
        request: PlaylistUpdateRequest,
    ) -> IngestResult<Playlist> {
        let mut playlist = self.get_playlist(id).await?;

        if let Some(name) = request.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(IngestError::validation("Playlist name must not be empty"));
            }
            playlist.name = name.to_string();
        }

        if let Some(url) = request.url {
            playlist.source_url =
                UrlUtils::parse_playlist_url(&url).map_err(IngestError::validation)?;
        }

        self.store.insert(StoredEntity::Playlist(playlist.clone()));
        self.store.commit().await?;

        debug!(
            "Updated playlist {} ({})",
            playlist.id(),
            UrlUtils::obfuscate_credentials(playlist.source_url.as_str())
        );
        Ok(playlist)
    }

    /// Remove a playlist with all of its channels and groups
    pub async fn delete_playlist(&self, id: Uuid) -> IngestResult<()> {
        let playlist = self.get_playlist(id).await?;

        self.store.delete(EntityRef::Playlist(id));
        self.store.commit().await?;

        info!("Deleted playlist '{}' ({})", playlist.name, id);
        Ok(())
    }
}
