//! In-memory playlist store
//!
//! Mirrors the SeaORM store's visibility and cascade rules without a database.
//! Used by tests and by hosts that do not need durable storage.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::{Mutex, PoisonError, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use super::traits::{
    EntityKind, EntityRef, PersistenceStore, PlaylistQueries, StagedOperation, StagedOperations,
    StoredEntity,
};
use crate::errors::{PersistenceError, PersistenceResult};
use crate::models::{Playlist, PlaylistChannel, PlaylistChannelGroup};

/// Number of committed entities per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub playlists: usize,
    pub channels: usize,
    pub groups: usize,
}

impl StoreCounts {
    pub fn is_empty(&self) -> bool {
        self.playlists == 0 && self.channels == 0 && self.groups == 0
    }
}

type Table<T> = IndexMap<Uuid, T>;

/// Reverts one change to a table made while applying a batch
#[derive(Debug)]
enum TableUndo<T> {
    /// The id existed; put the previous value back in place
    Restore(Uuid, T),
    /// The id was appended by the batch
    Remove(Uuid),
    Reinsert(usize, Uuid, T),
    /// Entries removed by a cascade, ascending by their former index
    ReinsertMany(Vec<(usize, Uuid, T)>),
}

impl<T> TableUndo<T> {
    fn revert(self, table: &mut Table<T>) {
        match self {
            TableUndo::Restore(id, previous) => {
                table.insert(id, previous);
            }
            TableUndo::Remove(id) => {
                // Reverting in reverse order leaves the appended id last
                table.swap_remove(&id);
            }
            TableUndo::Reinsert(index, id, item) => {
                table.shift_insert(index, id, item);
            }
            TableUndo::ReinsertMany(removed) => {
                let current = std::mem::take(table);
                let mut removed = removed.into_iter().peekable();
                for (id, item) in current {
                    while let Some((_, id, item)) =
                        removed.next_if(|(index, _, _)| *index == table.len())
                    {
                        table.insert(id, item);
                    }
                    table.insert(id, item);
                }
                table.extend(removed.map(|(_, id, item)| (id, item)));
            }
        }
    }
}

#[derive(Debug)]
enum Undo {
    Playlists(TableUndo<Playlist>),
    Channels(TableUndo<PlaylistChannel>),
    Groups(TableUndo<PlaylistChannelGroup>),
}

/// Committed entities keyed by id, in insertion order
#[derive(Debug, Default)]
struct MemoryState {
    playlists: Table<Playlist>,
    channels: Table<PlaylistChannel>,
    groups: Table<PlaylistChannelGroup>,
}

impl MemoryState {
    /// Apply a whole batch, or nothing if any operation fails
    fn apply_batch(&mut self, operations: Vec<StagedOperation>) -> PersistenceResult<()> {
        let mut journal = Vec::new();
        for operation in operations {
            if let Err(e) = self.apply(operation, &mut journal) {
                while let Some(undo) = journal.pop() {
                    self.revert(undo);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::Playlists(undo) => undo.revert(&mut self.playlists),
            Undo::Channels(undo) => undo.revert(&mut self.channels),
            Undo::Groups(undo) => undo.revert(&mut self.groups),
        }
    }

    fn apply(&mut self, operation: StagedOperation, journal: &mut Vec<Undo>) -> PersistenceResult<()> {
        match operation {
            StagedOperation::Insert(StoredEntity::Playlist(playlist)) => {
                let undo = upsert(&mut self.playlists, playlist.id(), playlist);
                journal.push(Undo::Playlists(undo));
            }
            StagedOperation::Insert(StoredEntity::Channel(channel)) => {
                self.require_playlist(channel.playlist_id, EntityKind::Channel, channel.id)?;
                let undo = upsert(&mut self.channels, channel.id, channel);
                journal.push(Undo::Channels(undo));
            }
            StagedOperation::Insert(StoredEntity::Group(group)) => {
                self.require_playlist(group.playlist_id, EntityKind::Group, group.id)?;
                if let Some(missing) = group
                    .channel_ids
                    .iter()
                    .find(|id| !self.channels.contains_key(*id))
                {
                    return Err(PersistenceError::commit_failed(format!(
                        "group {} references missing channel {}",
                        group.id, missing
                    )));
                }
                let undo = upsert(&mut self.groups, group.id, group);
                journal.push(Undo::Groups(undo));
            }
            StagedOperation::Delete(EntityRef::Playlist(id)) => {
                let groups = remove_where(&mut self.groups, |g| g.playlist_id == id);
                journal.push(Undo::Groups(TableUndo::ReinsertMany(groups)));
                let channels = remove_where(&mut self.channels, |c| c.playlist_id == id);
                journal.push(Undo::Channels(TableUndo::ReinsertMany(channels)));
                if let Some((index, id, playlist)) = self.playlists.shift_remove_full(&id) {
                    journal.push(Undo::Playlists(TableUndo::Reinsert(index, id, playlist)));
                }
            }
            StagedOperation::Delete(EntityRef::Channel(id)) => {
                if let Some((index, id, channel)) = self.channels.shift_remove_full(&id) {
                    for group in self.groups.values_mut() {
                        if group.playlist_id == channel.playlist_id && group.channel_ids.contains(&id) {
                            journal.push(Undo::Groups(TableUndo::Restore(group.id, group.clone())));
                            group.channel_ids.retain(|member| *member != id);
                        }
                    }
                    journal.push(Undo::Channels(TableUndo::Reinsert(index, id, channel)));
                }
            }
            StagedOperation::Delete(EntityRef::Group(id)) => {
                if let Some((index, id, group)) = self.groups.shift_remove_full(&id) {
                    journal.push(Undo::Groups(TableUndo::Reinsert(index, id, group)));
                }
            }
        }
        Ok(())
    }

    fn require_playlist(&self, playlist_id: Uuid, kind: EntityKind, id: Uuid) -> PersistenceResult<()> {
        if self.playlists.contains_key(&playlist_id) {
            Ok(())
        } else {
            Err(PersistenceError::commit_failed(format!(
                "{kind} {id} references missing playlist {playlist_id}"
            )))
        }
    }
}

/// Insert or replace in place, keeping the original position
fn upsert<T>(table: &mut Table<T>, id: Uuid, item: T) -> TableUndo<T> {
    match table.insert(id, item) {
        Some(previous) => TableUndo::Restore(id, previous),
        None => TableUndo::Remove(id),
    }
}

fn remove_where<T>(table: &mut Table<T>, matches: impl Fn(&T) -> bool) -> Vec<(usize, Uuid, T)> {
    if !table.values().any(&matches) {
        return Vec::new();
    }
    let mut removed = Vec::new();
    for (index, (id, item)) in std::mem::take(table).into_iter().enumerate() {
        if matches(&item) {
            removed.push((index, id, item));
        } else {
            table.insert(id, item);
        }
    }
    removed
}

#[derive(Debug, Default)]
pub struct MemoryPlaylistStore {
    committed: RwLock<MemoryState>,
    staged: StagedOperations,
    fail_on: Mutex<Option<EntityKind>>,
}

impl MemoryPlaylistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next commit that inserts an entity of `kind`
    pub fn fail_next_commit_with(&self, kind: EntityKind) {
        *self.fail_on.lock().unwrap_or_else(PoisonError::into_inner) = Some(kind);
    }

    pub fn counts(&self) -> StoreCounts {
        let state = self.committed.read().unwrap_or_else(PoisonError::into_inner);
        StoreCounts {
            playlists: state.playlists.len(),
            channels: state.channels.len(),
            groups: state.groups.len(),
        }
    }

    pub fn pending_operations(&self) -> usize {
        self.staged.len()
    }

    fn injected_failure(&self, operations: &[StagedOperation]) -> Option<EntityKind> {
        let mut fail_on = self.fail_on.lock().unwrap_or_else(PoisonError::into_inner);
        let kind = (*fail_on)?;
        let triggered = operations
            .iter()
            .any(|op| matches!(op, StagedOperation::Insert(entity) if entity.kind() == kind));
        if triggered {
            *fail_on = None;
            Some(kind)
        } else {
            None
        }
    }
}

#[async_trait]
impl PersistenceStore for MemoryPlaylistStore {
    fn insert(&self, entity: StoredEntity) {
        self.staged.push(StagedOperation::Insert(entity));
    }

    fn delete(&self, entity: EntityRef) {
        self.staged.push(StagedOperation::Delete(entity));
    }

    async fn commit(&self) -> PersistenceResult<()> {
        let operations = self.staged.take();

        if let Some(kind) = self.injected_failure(&operations) {
            warn!(
                "Rejecting commit of {} operations containing a {} insert",
                operations.len(),
                kind
            );
            return Err(PersistenceError::commit_failed(format!(
                "store rejected {kind} insert"
            )));
        }

        let count = operations.len();
        self.committed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply_batch(operations)?;

        debug!("Committed {} operations to memory store", count);
        Ok(())
    }
}

#[async_trait]
impl PlaylistQueries for MemoryPlaylistStore {
    async fn list_playlists(&self) -> PersistenceResult<Vec<Playlist>> {
        let state = self.committed.read().unwrap_or_else(PoisonError::into_inner);
        let mut playlists: Vec<Playlist> = state.playlists.values().cloned().collect();
        playlists.sort_by_key(|p| p.created_on());
        Ok(playlists)
    }

    async fn find_playlist(&self, id: Uuid) -> PersistenceResult<Option<Playlist>> {
        let state = self.committed.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.playlists.get(&id).cloned())
    }

    async fn channels_for_playlist(&self, playlist_id: Uuid) -> PersistenceResult<Vec<PlaylistChannel>> {
        let state = self.committed.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state
            .channels
            .values()
            .filter(|c| c.playlist_id == playlist_id)
            .cloned()
            .collect())
    }

    async fn groups_for_playlist(
        &self,
        playlist_id: Uuid,
    ) -> PersistenceResult<Vec<PlaylistChannelGroup>> {
        let state = self.committed.read().unwrap_or_else(PoisonError::into_inner);
        let mut groups: Vec<PlaylistChannelGroup> = state
            .groups
            .values()
            .filter(|g| g.playlist_id == playlist_id)
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }
}
