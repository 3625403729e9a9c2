use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "playlist_channels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub playlist_id: Uuid,
    /// Insertion order within the playlist
    pub position: i64,
    pub name: Option<String>,
    pub logo: Option<String>,
    pub duration_seconds: Option<i64>,
    pub group_name: String,
    pub media_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::playlists::Entity",
        from = "Column::PlaylistId",
        to = "super::playlists::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Playlists,
    #[sea_orm(has_many = "super::playlist_channel_group_members::Entity")]
    PlaylistChannelGroupMembers,
}

impl Related<super::playlists::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Playlists.def()
    }
}

impl Related<super::playlist_channel_group_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlaylistChannelGroupMembers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
