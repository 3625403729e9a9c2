mod common;

use std::sync::Arc;

use m3u_ingest::config::Config;
use m3u_ingest::database::Database;
use m3u_ingest::errors::{FormatError, IngestError, SourceError};
use m3u_ingest::models::IngestPhase;
use m3u_ingest::repositories::{PlaylistQueries, SeaOrmPlaylistStore};
use m3u_ingest::PlaylistService;

use common::{playlist_content, FixtureServer};

async fn sqlite_store() -> Arc<SeaOrmPlaylistStore> {
    let database = Database::in_memory().await.unwrap();
    Arc::new(SeaOrmPlaylistStore::from_database(&database))
}

#[tokio::test]
async fn test_end_to_end_ingestion_into_sqlite() {
    let server = FixtureServer::start(playlist_content(1500, 12)).await;
    let store = sqlite_store().await;
    let mut service = PlaylistService::from_config(&Config::default(), store.clone()).unwrap();

    let playlist = service
        .add_playlist("Fixture", server.url("playlist.m3u").as_str())
        .await
        .unwrap();

    let counts = store.counts().await.unwrap();
    assert_eq!(counts.playlists, 1);
    assert_eq!(counts.channels, 1500);
    assert_eq!(counts.groups, 12);

    let channels = store.channels_for_playlist(playlist.id()).await.unwrap();
    assert_eq!(channels[0].name.as_deref(), Some("Channel 0"));
    assert_eq!(channels[1499].name.as_deref(), Some("Channel 1499"));
    assert_eq!(
        channels[7].logo.as_deref(),
        Some("http://logo.example.com/7.png")
    );
    assert!(channels.iter().all(|c| c.is_live_content()));

    let groups = store.groups_for_playlist(playlist.id()).await.unwrap();
    let member_total: usize = groups.iter().map(|g| g.channel_ids.len()).sum();
    assert_eq!(member_total, 1500);
    let group_zero = groups.iter().find(|g| g.name == "Group 0").unwrap();
    assert_eq!(group_zero.channel_ids[0], channels[0].id);
    assert_eq!(group_zero.channel_ids[1], channels[12].id);

    let progress = service.progress().current().unwrap();
    assert_eq!(progress.phase, IngestPhase::PersistGroups);
}

#[tokio::test]
async fn test_http_failure_leaves_database_empty() {
    let server = FixtureServer::start(playlist_content(10, 2)).await;
    let store = sqlite_store().await;
    let mut service = PlaylistService::from_config(&Config::default(), store.clone()).unwrap();

    let error = service
        .add_playlist("Broken", server.url("missing.m3u").as_str())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        IngestError::Transport(SourceError::Http { status: 404, .. })
    ));
    assert!(store.counts().await.unwrap().is_empty());
    assert!(service.progress().current().is_none());
}

#[tokio::test]
async fn test_unusable_content_leaves_database_empty() {
    let server = FixtureServer::start("#EXTM3U\n# nothing to see\n".to_string()).await;
    let store = sqlite_store().await;
    let mut service = PlaylistService::from_config(&Config::default(), store.clone()).unwrap();

    let error = service
        .add_playlist("Empty", server.url("playlist.m3u").as_str())
        .await
        .unwrap_err();

    assert!(matches!(error, IngestError::Format(FormatError::InvalidFormat)));
    assert!(store.counts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_manage_stored_playlists() {
    let server = FixtureServer::start(playlist_content(30, 3)).await;
    let store = sqlite_store().await;
    let mut service = PlaylistService::from_config(&Config::default(), store.clone()).unwrap();

    let first = service
        .add_playlist("First", server.url("playlist.m3u").as_str())
        .await
        .unwrap();
    let second = service
        .add_playlist("Second", server.url("chunked.m3u").as_str())
        .await
        .unwrap();

    let names: Vec<String> = service
        .list_playlists()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["First", "Second"]);

    let renamed = service.rename_playlist(first.id(), "Renamed").await.unwrap();
    assert_eq!(renamed.name, "Renamed");
    assert_eq!(
        service.get_playlist(first.id()).await.unwrap().name,
        "Renamed"
    );

    service.delete_playlist(second.id()).await.unwrap();
    let counts = store.counts().await.unwrap();
    assert_eq!(counts.playlists, 1);
    assert_eq!(counts.channels, 30);
    assert_eq!(counts.groups, 3);
}
