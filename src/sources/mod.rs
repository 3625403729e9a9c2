//! Playlist sources: content fetching and M3U parsing

pub mod fetcher;
pub mod m3u;

pub use fetcher::{ContentFetcher, HttpContentFetcher};
pub use m3u::{M3uParser, ParsedPlaylist, PlaylistParser};
