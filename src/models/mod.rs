use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::errors::{IngestError, IngestResult, SourceError};
use crate::utils::url::UrlUtils;

/// A playlist registered by the user, owning all of its channels and groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    id: Uuid,
    pub name: String,
    pub source_url: Url,
    created_on: DateTime<Utc>,
}

impl Playlist {
    /// Create a playlist with a fresh id, stamped with the current time
    pub fn new(name: impl Into<String>, source_url: Url) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source_url,
            created_on: Utc::now(),
        }
    }

    /// Rebuild a playlist read back from a store
    pub fn restore(
        id: Uuid,
        name: impl Into<String>,
        source_url: Url,
        created_on: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            source_url,
            created_on,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_on(&self) -> DateTime<Utc> {
        self.created_on
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistChannel {
    pub id: Uuid,
    pub playlist_id: Uuid,
    pub name: Option<String>,
    /// Unvalidated logo reference; a placeholder when the entry has none
    pub logo: Option<String>,
    pub duration_seconds: Option<u32>,
    /// Group key, empty for ungrouped channels
    pub group: String,
    pub media_url: Option<Url>,
    /// EXTINF attributes with no recognized role, in line order. Not persisted.
    #[serde(skip)]
    pub attributes: Vec<(String, String)>,
}

impl PlaylistChannel {
    /// A channel is live content when its media path has no file extension
    pub fn is_live_content(&self) -> bool {
        self.media_url
            .as_ref()
            .map(|url| UrlUtils::path_extension(url).is_none())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistChannelGroup {
    pub id: Uuid,
    pub playlist_id: Uuid,
    pub name: String,
    /// Member channels in file encounter order
    pub channel_ids: Vec<Uuid>,
}

/// One event of a content download
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    /// `received / expected`, or `None` when the total length is unknown
    pub fraction: Option<f64>,
    pub completed: bool,
    pub error: Option<SourceError>,
    /// Full body, present only on successful completion
    pub payload: Option<Bytes>,
}

impl DownloadProgress {
    pub fn in_flight(fraction: Option<f64>) -> Self {
        Self {
            fraction: fraction.map(|f| f.clamp(0.0, 1.0)),
            completed: false,
            error: None,
            payload: None,
        }
    }

    pub fn finished(payload: Bytes) -> Self {
        Self {
            fraction: Some(1.0),
            completed: true,
            error: None,
            payload: Some(payload),
        }
    }

    pub fn failed(error: SourceError) -> Self {
        Self {
            fraction: None,
            completed: true,
            error: Some(error),
            payload: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParseProgress {
    pub fraction: f64,
    pub entries_so_far: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestPhase {
    Contact,
    Download,
    Parse,
    PersistChannels,
    PersistGroups,
}

impl IngestPhase {
    /// Overall fraction range covered by this phase
    pub fn range(self) -> (f64, f64) {
        match self {
            IngestPhase::Contact => (0.0, 0.01),
            IngestPhase::Download => (0.01, 0.46),
            IngestPhase::Parse => (0.46, 0.91),
            IngestPhase::PersistChannels => (0.91, 0.99),
            IngestPhase::PersistGroups => (0.99, 1.0),
        }
    }

    /// Map a fraction of this phase onto the overall fraction
    pub fn overall(self, phase_fraction: f64) -> f64 {
        let (start, end) = self.range();
        start + (end - start) * phase_fraction.clamp(0.0, 1.0)
    }
}

impl std::fmt::Display for IngestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestPhase::Contact => write!(f, "contact"),
            IngestPhase::Download => write!(f, "download"),
            IngestPhase::Parse => write!(f, "parse"),
            IngestPhase::PersistChannels => write!(f, "persist_channels"),
            IngestPhase::PersistGroups => write!(f, "persist_groups"),
        }
    }
}

/// The single progress value surfaced to observers of an ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestProgress {
    pub label: String,
    pub overall_fraction: f64,
    pub phase: IngestPhase,
}

/// Validated input for adding a playlist
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub url: Url,
}

impl CreatePlaylistRequest {
    /// Trim the name and check both fields before any work is started
    pub fn new(name: &str, url: &str) -> IngestResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IngestError::validation("Playlist name must not be empty"));
        }
        let url = UrlUtils::parse_playlist_url(url).map_err(IngestError::validation)?;
        Ok(Self {
            name: name.to_string(),
            url,
        })
    }
}

/// Changes to an existing playlist; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistUpdateRequest {
    pub name: Option<String>,
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_with_url(url: &str) -> PlaylistChannel {
        PlaylistChannel {
            id: Uuid::new_v4(),
            playlist_id: Uuid::new_v4(),
            name: Some("Channel name".to_string()),
            logo: None,
            duration_seconds: None,
            group: String::new(),
            media_url: Url::parse(url).ok(),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn test_is_live_content() {
        assert!(channel_with_url("https://test.com/1234").is_live_content());
        assert!(!channel_with_url("https://test.com/1234.mp4").is_live_content());
        assert!(channel_with_url("https://test.com/live/").is_live_content());

        let mut no_url = channel_with_url("https://test.com/1234");
        no_url.media_url = None;
        assert!(!no_url.is_live_content());
    }

    #[test]
    fn test_phase_overall_fraction() {
        assert_eq!(IngestPhase::Contact.overall(1.0), 0.01);
        assert!((IngestPhase::Download.overall(0.5) - 0.235).abs() < 1e-9);
        assert!((IngestPhase::Parse.overall(1.0) - 0.91).abs() < 1e-9);
        assert!((IngestPhase::PersistChannels.overall(0.5) - 0.95).abs() < 1e-9);
        assert!((IngestPhase::PersistGroups.overall(2.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_create_request_validation() {
        let request = CreatePlaylistRequest::new("  My list ", "https://example.com/list.m3u").unwrap();
        assert_eq!(request.name, "My list");

        assert!(matches!(
            CreatePlaylistRequest::new("   ", "https://example.com/list.m3u"),
            Err(IngestError::Validation { .. })
        ));
        assert!(matches!(
            CreatePlaylistRequest::new("List", "not a url"),
            Err(IngestError::Validation { .. })
        ));
        assert!(matches!(
            CreatePlaylistRequest::new("List", "ftp://example.com/list.m3u"),
            Err(IngestError::Validation { .. })
        ));
    }

    #[test]
    fn test_download_progress_constructors() {
        let progress = DownloadProgress::in_flight(Some(1.5));
        assert_eq!(progress.fraction, Some(1.0));
        assert!(!progress.is_terminal());

        let done = DownloadProgress::finished(Bytes::from_static(b"#EXTM3U"));
        assert!(done.is_terminal());
        assert!(done.error.is_none());

        let failed = DownloadProgress::failed(SourceError::MissingPayload);
        assert!(failed.is_terminal());
        assert!(failed.payload.is_none());
    }
}
