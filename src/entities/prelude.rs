pub use super::playlist_channel_group_members::Entity as PlaylistChannelGroupMembers;
pub use super::playlist_channel_groups::Entity as PlaylistChannelGroups;
pub use super::playlist_channels::Entity as PlaylistChannels;
pub use super::playlists::Entity as Playlists;
