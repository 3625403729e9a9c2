use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "playlists")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub source_url: String,
    pub created_on: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::playlist_channels::Entity")]
    PlaylistChannels,
    #[sea_orm(has_many = "super::playlist_channel_groups::Entity")]
    PlaylistChannelGroups,
}

impl Related<super::playlist_channels::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlaylistChannels.def()
    }
}

impl Related<super::playlist_channel_groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlaylistChannelGroups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
