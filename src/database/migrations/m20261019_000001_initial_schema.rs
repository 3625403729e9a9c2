use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create tables in order of dependencies
        self.create_playlists_table(manager).await?;
        self.create_playlist_channels_table(manager).await?;
        self.create_playlist_channel_groups_table(manager).await?;
        self.create_playlist_channel_group_members_table(manager).await?;

        self.create_indexes(manager).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order
        manager
            .drop_table(Table::drop().table(PlaylistChannelGroupMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PlaylistChannelGroups::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PlaylistChannels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Playlists::Table).to_owned())
            .await?;

        Ok(())
    }
}

impl Migration {
    // UUIDs are native on Postgres and stored as strings elsewhere
    fn create_id_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.uuid().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    fn create_timestamp_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    async fn create_playlists_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Playlists::Table)
                    .if_not_exists()
                    .col(self.create_id_column(manager, Playlists::Id).primary_key())
                    .col(ColumnDef::new(Playlists::Name).string().not_null())
                    .col(ColumnDef::new(Playlists::SourceUrl).string().not_null())
                    .col(self.create_timestamp_column(manager, Playlists::CreatedOn))
                    .to_owned(),
            )
            .await
    }

    async fn create_playlist_channels_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PlaylistChannels::Table)
                    .if_not_exists()
                    .col(self.create_id_column(manager, PlaylistChannels::Id).primary_key())
                    .col(self.create_id_column(manager, PlaylistChannels::PlaylistId))
                    .col(ColumnDef::new(PlaylistChannels::Position).big_integer().not_null())
                    .col(ColumnDef::new(PlaylistChannels::Name).string())
                    .col(ColumnDef::new(PlaylistChannels::Logo).string())
                    .col(ColumnDef::new(PlaylistChannels::DurationSeconds).big_integer())
                    .col(ColumnDef::new(PlaylistChannels::GroupName).string().not_null())
                    .col(ColumnDef::new(PlaylistChannels::MediaUrl).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_playlist_channels_playlist_id")
                            .from(PlaylistChannels::Table, PlaylistChannels::PlaylistId)
                            .to(Playlists::Table, Playlists::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_playlist_channel_groups_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PlaylistChannelGroups::Table)
                    .if_not_exists()
                    .col(self.create_id_column(manager, PlaylistChannelGroups::Id).primary_key())
                    .col(self.create_id_column(manager, PlaylistChannelGroups::PlaylistId))
                    .col(ColumnDef::new(PlaylistChannelGroups::Name).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_playlist_channel_groups_playlist_id")
                            .from(PlaylistChannelGroups::Table, PlaylistChannelGroups::PlaylistId)
                            .to(Playlists::Table, Playlists::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_playlist_channel_group_members_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PlaylistChannelGroupMembers::Table)
                    .if_not_exists()
                    .col(self.create_id_column(manager, PlaylistChannelGroupMembers::GroupId))
                    .col(self.create_id_column(manager, PlaylistChannelGroupMembers::ChannelId))
                    .col(
                        ColumnDef::new(PlaylistChannelGroupMembers::Position)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(PlaylistChannelGroupMembers::GroupId)
                            .col(PlaylistChannelGroupMembers::ChannelId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_playlist_channel_group_members_group_id")
                            .from(
                                PlaylistChannelGroupMembers::Table,
                                PlaylistChannelGroupMembers::GroupId,
                            )
                            .to(PlaylistChannelGroups::Table, PlaylistChannelGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_playlist_channel_group_members_channel_id")
                            .from(
                                PlaylistChannelGroupMembers::Table,
                                PlaylistChannelGroupMembers::ChannelId,
                            )
                            .to(PlaylistChannels::Table, PlaylistChannels::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_playlist_channels_playlist_position")
                    .table(PlaylistChannels::Table)
                    .col(PlaylistChannels::PlaylistId)
                    .col(PlaylistChannels::Position)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_playlist_channel_groups_playlist_name")
                    .table(PlaylistChannelGroups::Table)
                    .col(PlaylistChannelGroups::PlaylistId)
                    .col(PlaylistChannelGroups::Name)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_playlist_channel_group_members_channel")
                    .table(PlaylistChannelGroupMembers::Table)
                    .col(PlaylistChannelGroupMembers::ChannelId)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Playlists {
    Table,
    Id,
    Name,
    SourceUrl,
    CreatedOn,
}

#[derive(DeriveIden)]
enum PlaylistChannels {
    Table,
    Id,
    PlaylistId,
    Position,
    Name,
    Logo,
    DurationSeconds,
    GroupName,
    MediaUrl,
}

#[derive(DeriveIden)]
enum PlaylistChannelGroups {
    Table,
    Id,
    PlaylistId,
    Name,
}

#[derive(DeriveIden)]
enum PlaylistChannelGroupMembers {
    Table,
    GroupId,
    ChannelId,
    Position,
}
