//! SeaORM entities for the playlist store

pub mod prelude;

pub mod playlist_channel_group_members;
pub mod playlist_channel_groups;
pub mod playlist_channels;
pub mod playlists;
