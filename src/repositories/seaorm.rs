//! SeaORM-backed playlist store
//!
//! Operations are staged in memory and applied inside one database
//! transaction per `commit()`. Rows are never visible before their commit.

use async_trait::async_trait;
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

use super::memory::StoreCounts;
use super::traits::{
    EntityRef, PersistenceStore, PlaylistQueries, StagedOperation, StagedOperations, StoredEntity,
};
use crate::database::Database;
use crate::entities::{
    playlist_channel_group_members, playlist_channel_groups, playlist_channels, playlists,
    prelude::*,
};
use crate::errors::{PersistenceError, PersistenceResult};
use crate::models::{Playlist, PlaylistChannel, PlaylistChannelGroup};

/// Membership rows per insert statement, keeps SQLite under its bind limit
const MEMBER_INSERT_CHUNK: usize = 1000;
/// Channel rows per insert or lookup statement
const CHANNEL_INSERT_CHUNK: usize = 500;

#[derive(Clone)]
pub struct SeaOrmPlaylistStore {
    connection: Arc<DatabaseConnection>,
    staged: Arc<StagedOperations>,
}

impl SeaOrmPlaylistStore {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self {
            connection,
            staged: Arc::new(StagedOperations::default()),
        }
    }

    pub fn from_database(database: &Database) -> Self {
        Self::new(database.connection())
    }

    /// Number of committed rows per entity kind
    pub async fn counts(&self) -> PersistenceResult<StoreCounts> {
        let connection = &*self.connection;
        Ok(StoreCounts {
            playlists: Playlists::find().count(connection).await? as usize,
            channels: PlaylistChannels::find().count(connection).await? as usize,
            groups: PlaylistChannelGroups::find().count(connection).await? as usize,
        })
    }

    /// Apply a batch in order. Runs of channel inserts are written together.
    async fn apply_all(txn: &DatabaseTransaction, operations: Vec<StagedOperation>) -> Result<(), DbErr> {
        let mut next_positions = HashMap::new();
        let mut pending = Vec::new();
        let mut pending_ids = HashSet::new();

        for operation in operations {
            match operation {
                StagedOperation::Insert(StoredEntity::Channel(channel))
                    if !pending_ids.contains(&channel.id) =>
                {
                    pending_ids.insert(channel.id);
                    pending.push(channel);
                }
                operation => {
                    Self::save_channels(txn, std::mem::take(&mut pending), &mut next_positions).await?;
                    pending_ids.clear();
                    Self::apply(txn, operation, &mut next_positions).await?;
                }
            }
        }

        Self::save_channels(txn, pending, &mut next_positions).await
    }

    async fn apply(
        txn: &DatabaseTransaction,
        operation: StagedOperation,
        next_positions: &mut HashMap<Uuid, i64>,
    ) -> Result<(), DbErr> {
        match operation {
            StagedOperation::Insert(StoredEntity::Playlist(playlist)) => {
                Self::save_playlist(txn, playlist).await
            }
            StagedOperation::Insert(StoredEntity::Channel(channel)) => {
                Self::save_channels(txn, vec![channel], next_positions).await
            }
            StagedOperation::Insert(StoredEntity::Group(group)) => Self::save_group(txn, group).await,
            StagedOperation::Delete(EntityRef::Playlist(id)) => Self::delete_playlist(txn, id).await,
            StagedOperation::Delete(EntityRef::Channel(id)) => {
                PlaylistChannelGroupMembers::delete_many()
                    .filter(playlist_channel_group_members::Column::ChannelId.eq(id))
                    .exec(txn)
                    .await?;
                PlaylistChannels::delete_by_id(id).exec(txn).await?;
                Ok(())
            }
            StagedOperation::Delete(EntityRef::Group(id)) => {
                PlaylistChannelGroupMembers::delete_many()
                    .filter(playlist_channel_group_members::Column::GroupId.eq(id))
                    .exec(txn)
                    .await?;
                PlaylistChannelGroups::delete_by_id(id).exec(txn).await?;
                Ok(())
            }
        }
    }

    async fn save_playlist(txn: &DatabaseTransaction, playlist: Playlist) -> Result<(), DbErr> {
        let exists = Playlists::find_by_id(playlist.id()).one(txn).await?.is_some();
        let active_model = playlists::ActiveModel {
            id: Set(playlist.id()),
            name: Set(playlist.name.clone()),
            source_url: Set(playlist.source_url.to_string()),
            created_on: Set(playlist.created_on()),
        };

        if exists {
            active_model.update(txn).await?;
        } else {
            active_model.insert(txn).await?;
        }
        Ok(())
    }

    /// Update channels that already exist, insert the rest in chunks at the
    /// end of their playlist
    async fn save_channels(
        txn: &DatabaseTransaction,
        channels: Vec<PlaylistChannel>,
        next_positions: &mut HashMap<Uuid, i64>,
    ) -> Result<(), DbErr> {
        if channels.is_empty() {
            return Ok(());
        }

        let mut existing = HashMap::new();
        for chunk in channels.chunks(CHANNEL_INSERT_CHUNK) {
            let models = PlaylistChannels::find()
                .filter(playlist_channels::Column::Id.is_in(chunk.iter().map(|c| c.id)))
                .all(txn)
                .await?;
            existing.extend(models.into_iter().map(|model| (model.id, model.position)));
        }

        let mut fresh = Vec::with_capacity(channels.len() - existing.len());
        for channel in channels {
            match existing.get(&channel.id) {
                Some(position) => {
                    Self::channel_model(channel, *position).update(txn).await?;
                }
                None => {
                    let position = Self::next_position(txn, channel.playlist_id, next_positions).await?;
                    fresh.push(Self::channel_model(channel, position));
                }
            }
        }

        let inserted = fresh.len();
        for chunk in fresh.chunks(CHANNEL_INSERT_CHUNK) {
            PlaylistChannels::insert_many(chunk.to_vec())
                .exec_without_returning(txn)
                .await?;
        }
        debug!(
            "Saved {} channels ({} new, {} updated)",
            inserted + existing.len(),
            inserted,
            existing.len()
        );
        Ok(())
    }

    fn channel_model(channel: PlaylistChannel, position: i64) -> playlist_channels::ActiveModel {
        playlist_channels::ActiveModel {
            id: Set(channel.id),
            playlist_id: Set(channel.playlist_id),
            position: Set(position),
            name: Set(channel.name),
            logo: Set(channel.logo),
            duration_seconds: Set(channel.duration_seconds.map(i64::from)),
            group_name: Set(channel.group),
            media_url: Set(channel.media_url.map(|url| url.to_string())),
        }
    }

    /// Next channel position in a playlist, cached for the rest of the commit
    async fn next_position(
        txn: &DatabaseTransaction,
        playlist_id: Uuid,
        next_positions: &mut HashMap<Uuid, i64>,
    ) -> Result<i64, DbErr> {
        let position = match next_positions.get(&playlist_id) {
            Some(position) => *position,
            None => PlaylistChannels::find()
                .filter(playlist_channels::Column::PlaylistId.eq(playlist_id))
                .order_by_desc(playlist_channels::Column::Position)
                .one(txn)
                .await?
                .map(|last| last.position + 1)
                .unwrap_or(0),
        };
        next_positions.insert(playlist_id, position + 1);
        Ok(position)
    }

    async fn save_group(txn: &DatabaseTransaction, group: PlaylistChannelGroup) -> Result<(), DbErr> {
        let exists = PlaylistChannelGroups::find_by_id(group.id)
            .one(txn)
            .await?
            .is_some();
        let active_model = playlist_channel_groups::ActiveModel {
            id: Set(group.id),
            playlist_id: Set(group.playlist_id),
            name: Set(group.name.clone()),
        };

        if exists {
            active_model.update(txn).await?;
            PlaylistChannelGroupMembers::delete_many()
                .filter(playlist_channel_group_members::Column::GroupId.eq(group.id))
                .exec(txn)
                .await?;
        } else {
            active_model.insert(txn).await?;
        }

        let members: Vec<playlist_channel_group_members::ActiveModel> = group
            .channel_ids
            .iter()
            .enumerate()
            .map(|(position, channel_id)| playlist_channel_group_members::ActiveModel {
                group_id: Set(group.id),
                channel_id: Set(*channel_id),
                position: Set(position as i64),
            })
            .collect();

        for chunk in members.chunks(MEMBER_INSERT_CHUNK) {
            PlaylistChannelGroupMembers::insert_many(chunk.to_vec())
                .exec_without_returning(txn)
                .await?;
        }
        Ok(())
    }

    /// Remove a playlist with its groups, memberships and channels
    async fn delete_playlist(txn: &DatabaseTransaction, id: Uuid) -> Result<(), DbErr> {
        PlaylistChannelGroupMembers::delete_many()
            .filter(
                playlist_channel_group_members::Column::GroupId.in_subquery(
                    Query::select()
                        .column(playlist_channel_groups::Column::Id)
                        .from(PlaylistChannelGroups)
                        .and_where(playlist_channel_groups::Column::PlaylistId.eq(id))
                        .to_owned(),
                ),
            )
            .exec(txn)
            .await?;
        PlaylistChannelGroups::delete_many()
            .filter(playlist_channel_groups::Column::PlaylistId.eq(id))
            .exec(txn)
            .await?;
        PlaylistChannels::delete_many()
            .filter(playlist_channels::Column::PlaylistId.eq(id))
            .exec(txn)
            .await?;
        Playlists::delete_by_id(id).exec(txn).await?;
        Ok(())
    }

    fn to_playlist(model: playlists::Model) -> PersistenceResult<Playlist> {
        let source_url = Url::parse(&model.source_url).map_err(|e| {
            DbErr::Custom(format!(
                "Stored URL for playlist {} is invalid: {}",
                model.id, e
            ))
        })?;
        Ok(Playlist::restore(
            model.id,
            model.name,
            source_url,
            model.created_on,
        ))
    }

    fn to_channel(model: playlist_channels::Model) -> PlaylistChannel {
        PlaylistChannel {
            id: model.id,
            playlist_id: model.playlist_id,
            name: model.name,
            logo: model.logo,
            duration_seconds: model.duration_seconds.and_then(|d| u32::try_from(d).ok()),
            group: model.group_name,
            media_url: model.media_url.and_then(|url| Url::parse(&url).ok()),
            attributes: Vec::new(),
        }
    }
}

#[async_trait]
impl PersistenceStore for SeaOrmPlaylistStore {
    fn insert(&self, entity: StoredEntity) {
        self.staged.push(StagedOperation::Insert(entity));
    }

    fn delete(&self, entity: EntityRef) {
        self.staged.push(StagedOperation::Delete(entity));
    }

    async fn commit(&self) -> PersistenceResult<()> {
        let operations = self.staged.take();
        if operations.is_empty() {
            return Ok(());
        }

        let count = operations.len();
        let txn = self.connection.begin().await?;

        if let Err(e) = Self::apply_all(&txn, operations).await {
            error!("Commit of {} operations failed: {}", count, e);
            if let Err(rollback_error) = txn.rollback().await {
                error!("Rollback after failed commit also failed: {}", rollback_error);
            }
            return Err(PersistenceError::commit_failed(e.to_string()));
        }

        txn.commit()
            .await
            .map_err(|e| PersistenceError::commit_failed(e.to_string()))?;

        debug!("Committed {} operations to database", count);
        Ok(())
    }
}

#[async_trait]
impl PlaylistQueries for SeaOrmPlaylistStore {
    async fn list_playlists(&self) -> PersistenceResult<Vec<Playlist>> {
        Playlists::find()
            .order_by_asc(playlists::Column::CreatedOn)
            .all(&*self.connection)
            .await?
            .into_iter()
            .map(Self::to_playlist)
            .collect()
    }

    async fn find_playlist(&self, id: Uuid) -> PersistenceResult<Option<Playlist>> {
        Playlists::find_by_id(id)
            .one(&*self.connection)
            .await?
            .map(Self::to_playlist)
            .transpose()
    }

    async fn channels_for_playlist(&self, playlist_id: Uuid) -> PersistenceResult<Vec<PlaylistChannel>> {
        let models = PlaylistChannels::find()
            .filter(playlist_channels::Column::PlaylistId.eq(playlist_id))
            .order_by_asc(playlist_channels::Column::Position)
            .all(&*self.connection)
            .await?;
        Ok(models.into_iter().map(Self::to_channel).collect())
    }

    async fn groups_for_playlist(
        &self,
        playlist_id: Uuid,
    ) -> PersistenceResult<Vec<PlaylistChannelGroup>> {
        let group_models = PlaylistChannelGroups::find()
            .filter(playlist_channel_groups::Column::PlaylistId.eq(playlist_id))
            .order_by_asc(playlist_channel_groups::Column::Name)
            .all(&*self.connection)
            .await?;
        if group_models.is_empty() {
            return Ok(Vec::new());
        }

        let member_models = PlaylistChannelGroupMembers::find()
            .filter(
                playlist_channel_group_members::Column::GroupId.in_subquery(
                    Query::select()
                        .column(playlist_channel_groups::Column::Id)
                        .from(PlaylistChannelGroups)
                        .and_where(playlist_channel_groups::Column::PlaylistId.eq(playlist_id))
                        .to_owned(),
                ),
            )
            .order_by_asc(playlist_channel_group_members::Column::Position)
            .all(&*self.connection)
            .await?;

        let mut members: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for member in member_models {
            members.entry(member.group_id).or_default().push(member.channel_id);
        }

        Ok(group_models
            .into_iter()
            .map(|model| PlaylistChannelGroup {
                channel_ids: members.remove(&model.id).unwrap_or_default(),
                id: model.id,
                playlist_id: model.playlist_id,
                name: model.name,
            })
            .collect())
    }
}
