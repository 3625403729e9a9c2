use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::IngestionStateManager;
use crate::config::IngestionConfig;
use crate::config::defaults::{DEFAULT_CHANNEL_COMMIT_INTERVAL, DEFAULT_GROUP_COMMIT_INTERVAL};
use crate::errors::{IngestError, IngestResult, SourceError};
use crate::models::{CreatePlaylistRequest, IngestPhase, ParseProgress, Playlist};
use crate::repositories::{EntityRef, PersistenceStore, StoredEntity};
use crate::sources::{ContentFetcher, ParsedPlaylist, PlaylistParser};
use crate::utils::url::UrlUtils;

/// Ids inserted during one ingestion attempt, removed again on failure
#[derive(Debug, Default)]
struct InsertedIds {
    playlist: Option<Uuid>,
    channels: Vec<Uuid>,
    groups: Vec<Uuid>,
}

impl InsertedIds {
    fn is_empty(&self) -> bool {
        self.playlist.is_none() && self.channels.is_empty() && self.groups.is_empty()
    }
}

/// Drives download, parse and persistence of a new playlist
///
/// `add_playlist` takes `&mut self`, so one coordinator runs one ingestion at
/// a time. Progress is published to the [`IngestionStateManager`].
pub struct IngestionCoordinator<F, P, S> {
    fetcher: F,
    parser: P,
    store: Arc<S>,
    state_manager: IngestionStateManager,
    channel_commit_interval: usize,
    group_commit_interval: usize,
}

impl<F, P, S> IngestionCoordinator<F, P, S>
where
    F: ContentFetcher,
    P: PlaylistParser,
    S: PersistenceStore,
{
    pub fn new(fetcher: F, parser: P, store: Arc<S>) -> Self {
        Self {
            fetcher,
            parser,
            store,
            state_manager: IngestionStateManager::new(),
            channel_commit_interval: DEFAULT_CHANNEL_COMMIT_INTERVAL,
            group_commit_interval: DEFAULT_GROUP_COMMIT_INTERVAL,
        }
    }

    pub fn with_config(fetcher: F, parser: P, store: Arc<S>, config: &IngestionConfig) -> Self {
        Self {
            channel_commit_interval: config.channel_commit_interval.max(1),
            group_commit_interval: config.group_commit_interval.max(1),
            ..Self::new(fetcher, parser, store)
        }
    }

    pub fn state_manager(&self) -> &IngestionStateManager {
        &self.state_manager
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Download, parse and store a playlist.
    ///
    /// On any failure everything inserted during this call is deleted again,
    /// published progress is cleared and the error is returned.
    pub async fn add_playlist(&mut self, request: CreatePlaylistRequest) -> IngestResult<Playlist> {
        let playlist = Playlist::new(request.name, request.url);
        let display_url = UrlUtils::obfuscate_credentials(playlist.source_url.as_str());
        info!(
            "Starting M3U ingestion for playlist '{}' ({}) from {}",
            playlist.name,
            playlist.id(),
            display_url
        );

        self.state_manager.clear();
        let mut inserted = InsertedIds::default();

        match self.ingest(&playlist, &mut inserted).await {
            Ok(()) => {
                info!(
                    "M3U ingestion completed for playlist '{}': {} channels in {} groups",
                    playlist.name,
                    inserted.channels.len(),
                    inserted.groups.len()
                );
                Ok(playlist)
            }
            Err(e) => {
                error!(
                    "M3U ingestion failed for playlist '{}' ({}): {}",
                    playlist.name,
                    playlist.id(),
                    e
                );
                self.roll_back(&inserted).await;
                self.state_manager.clear();
                Err(e)
            }
        }
    }

    async fn ingest(&self, playlist: &Playlist, inserted: &mut InsertedIds) -> IngestResult<()> {
        // The playlist row exists before any network traffic
        self.store.insert(StoredEntity::Playlist(playlist.clone()));
        inserted.playlist = Some(playlist.id());
        self.store.commit().await?;

        self.state_manager
            .update_progress(IngestPhase::Contact, 1.0, "Contacting the server...");
        let payload = self.download(playlist).await?;

        let parsed = self.parse(playlist, &payload).await?;
        drop(payload);

        self.persist(parsed, inserted).await
    }

    async fn download(&self, playlist: &Playlist) -> IngestResult<Bytes> {
        let mut events = self.fetcher.fetch(&playlist.source_url);

        while let Some(event) = events.next().await {
            if let Some(error) = event.error {
                return Err(IngestError::Transport(error));
            }

            if event.completed {
                let payload = event.payload.ok_or(SourceError::MissingPayload)?;
                info!(
                    "Downloaded {} bytes for playlist '{}'",
                    payload.len(),
                    playlist.name
                );
                return Ok(payload);
            }

            self.state_manager.update_progress(
                IngestPhase::Download,
                event.fraction.unwrap_or(0.0),
                "Downloading...",
            );
        }

        Err(SourceError::transport(
            UrlUtils::obfuscate_credentials(playlist.source_url.as_str()),
            "transfer ended without completing",
        )
        .into())
    }

    async fn parse(&self, playlist: &Playlist, payload: &Bytes) -> IngestResult<ParsedPlaylist> {
        self.state_manager
            .update_progress(IngestPhase::Parse, 0.0, "Analyzing downloaded content...");

        let state_manager = self.state_manager.clone();
        let mut on_progress = move |progress: ParseProgress| {
            state_manager.update_progress(
                IngestPhase::Parse,
                progress.fraction,
                format!("Parsing channel {}...", progress.entries_so_far),
            );
        };

        let parsed = self
            .parser
            .parse(payload, playlist.id(), &mut on_progress)
            .await?;
        Ok(parsed)
    }

    async fn persist(&self, parsed: ParsedPlaylist, inserted: &mut InsertedIds) -> IngestResult<()> {
        let channel_total = parsed.channels.len();
        info!("Saving {} channels", channel_total);
        self.state_manager
            .update_progress(IngestPhase::PersistChannels, 0.0, "Saving channels...");

        for (index, channel) in parsed.channels.into_iter().enumerate() {
            inserted.channels.push(channel.id);
            self.store.insert(StoredEntity::Channel(channel));

            let saved = index + 1;
            if saved % self.channel_commit_interval == 0 {
                self.store.commit().await?;
                debug!("Committed {}/{} channels", saved, channel_total);
                self.state_manager.update_progress(
                    IngestPhase::PersistChannels,
                    saved as f64 / channel_total as f64,
                    format!("Saving channels {saved}/{channel_total}..."),
                );
                tokio::task::yield_now().await;
            }
        }
        self.store.commit().await?;
        self.state_manager.update_progress(
            IngestPhase::PersistChannels,
            1.0,
            format!("Saving channels {channel_total}/{channel_total}..."),
        );

        let group_total = parsed.groups.len();
        info!("Saving {} channel groups", group_total);
        self.state_manager
            .update_progress(IngestPhase::PersistGroups, 0.0, "Saving channel groups...");

        for (index, group) in parsed.groups.into_iter().enumerate() {
            inserted.groups.push(group.id);
            self.store.insert(StoredEntity::Group(group));

            let saved = index + 1;
            if saved % self.group_commit_interval == 0 {
                self.store.commit().await?;
                self.state_manager.update_progress(
                    IngestPhase::PersistGroups,
                    saved as f64 / group_total as f64,
                    format!("Saving channel groups {saved}/{group_total}..."),
                );
                tokio::task::yield_now().await;
            }
        }
        self.store.commit().await?;
        self.state_manager.update_progress(
            IngestPhase::PersistGroups,
            1.0,
            format!("Saving channel groups {group_total}/{group_total}..."),
        );

        Ok(())
    }

    /// Delete groups, then channels, then the playlist, in one commit
    async fn roll_back(&self, inserted: &InsertedIds) {
        if inserted.is_empty() {
            return;
        }

        for id in inserted.groups.iter().rev() {
            self.store.delete(EntityRef::Group(*id));
        }
        for id in inserted.channels.iter().rev() {
            self.store.delete(EntityRef::Channel(*id));
        }
        if let Some(id) = inserted.playlist {
            self.store.delete(EntityRef::Playlist(id));
        }

        match self.store.commit().await {
            Ok(()) => info!(
                "Rolled back {} groups and {} channels of failed ingestion",
                inserted.groups.len(),
                inserted.channels.len()
            ),
            Err(e) => error!("Rollback of failed ingestion did not commit: {}", e),
        }
    }
}
