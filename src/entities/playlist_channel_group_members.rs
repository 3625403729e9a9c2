use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "playlist_channel_group_members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub group_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub channel_id: Uuid,
    /// Member order within the group
    pub position: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::playlist_channel_groups::Entity",
        from = "Column::GroupId",
        to = "super::playlist_channel_groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    PlaylistChannelGroups,
    #[sea_orm(
        belongs_to = "super::playlist_channels::Entity",
        from = "Column::ChannelId",
        to = "super::playlist_channels::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    PlaylistChannels,
}

impl Related<super::playlist_channel_groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlaylistChannelGroups.def()
    }
}

impl Related<super::playlist_channels::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlaylistChannels.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
