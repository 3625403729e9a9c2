//! Store contracts shared by the in-memory and SeaORM playlist stores

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use crate::errors::PersistenceResult;
use crate::models::{Playlist, PlaylistChannel, PlaylistChannelGroup};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Playlist,
    Channel,
    Group,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Playlist => write!(f, "playlist"),
            EntityKind::Channel => write!(f, "channel"),
            EntityKind::Group => write!(f, "group"),
        }
    }
}

/// An entity staged for insertion. Inserting an existing id replaces it.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredEntity {
    Playlist(Playlist),
    Channel(PlaylistChannel),
    Group(PlaylistChannelGroup),
}

impl StoredEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            StoredEntity::Playlist(_) => EntityKind::Playlist,
            StoredEntity::Channel(_) => EntityKind::Channel,
            StoredEntity::Group(_) => EntityKind::Group,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            StoredEntity::Playlist(playlist) => playlist.id(),
            StoredEntity::Channel(channel) => channel.id,
            StoredEntity::Group(group) => group.id,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        match self.kind() {
            EntityKind::Playlist => EntityRef::Playlist(self.id()),
            EntityKind::Channel => EntityRef::Channel(self.id()),
            EntityKind::Group => EntityRef::Group(self.id()),
        }
    }
}

impl From<Playlist> for StoredEntity {
    fn from(playlist: Playlist) -> Self {
        StoredEntity::Playlist(playlist)
    }
}

impl From<PlaylistChannel> for StoredEntity {
    fn from(channel: PlaylistChannel) -> Self {
        StoredEntity::Channel(channel)
    }
}

impl From<PlaylistChannelGroup> for StoredEntity {
    fn from(group: PlaylistChannelGroup) -> Self {
        StoredEntity::Group(group)
    }
}

/// Identifies an entity staged for deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    /// Deleting a playlist also deletes its channels and groups
    Playlist(Uuid),
    /// Deleting a channel also removes it from every group
    Channel(Uuid),
    Group(Uuid),
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Playlist(_) => EntityKind::Playlist,
            EntityRef::Channel(_) => EntityKind::Channel,
            EntityRef::Group(_) => EntityKind::Group,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StagedOperation {
    Insert(StoredEntity),
    Delete(EntityRef),
}

/// Transactional persistence boundary used during ingestion
///
/// Staged operations become visible only when `commit` succeeds. A failed
/// commit discards everything staged since the previous commit.
///
/// The staging buffer belongs to the store and is shared by every caller
/// holding it, including clones of `SeaOrmPlaylistStore`. A `commit` flushes
/// whatever any caller staged, so concurrent ingestions need separate store
/// instances.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    fn insert(&self, entity: StoredEntity);

    fn delete(&self, entity: EntityRef);

    async fn commit(&self) -> PersistenceResult<()>;
}

/// Read access to committed playlist data
#[async_trait]
pub trait PlaylistQueries: Send + Sync {
    /// All playlists, oldest first
    async fn list_playlists(&self) -> PersistenceResult<Vec<Playlist>>;

    async fn find_playlist(&self, id: Uuid) -> PersistenceResult<Option<Playlist>>;

    /// Channels of a playlist in insertion order
    async fn channels_for_playlist(&self, playlist_id: Uuid) -> PersistenceResult<Vec<PlaylistChannel>>;

    /// Groups of a playlist ordered by name, members in insertion order
    async fn groups_for_playlist(
        &self,
        playlist_id: Uuid,
    ) -> PersistenceResult<Vec<PlaylistChannelGroup>>;
}

/// Pending operations awaiting the next commit
#[derive(Debug, Default)]
pub struct StagedOperations {
    operations: Mutex<Vec<StagedOperation>>,
}

impl StagedOperations {
    pub fn push(&self, operation: StagedOperation) {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(operation);
    }

    /// Remove and return everything staged so far
    pub fn take(&self) -> Vec<StagedOperation> {
        std::mem::take(&mut *self.operations.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
