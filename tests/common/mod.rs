//! HTTP fixture server for integration tests

#![allow(dead_code)]

use axum::body::Body;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use url::Url;

pub struct FixtureServer {
    base: Url,
    handle: JoinHandle<()>,
}

impl FixtureServer {
    /// Serve `playlist` on several routes of a local server:
    ///
    /// - `/playlist.m3u` with a content length
    /// - `/chunked.m3u` in small chunks without a content length
    /// - `/missing.m3u` answering 404
    /// - `/stalled.m3u` sending the header line and then nothing
    pub async fn start(playlist: String) -> Self {
        let full_body = playlist.clone();
        let chunked_body = playlist;

        let app = Router::new()
            .route(
                "/playlist.m3u",
                get(move || {
                    let body = full_body.clone();
                    async move { body }
                }),
            )
            .route(
                "/chunked.m3u",
                get(move || {
                    let chunks: Vec<Bytes> = chunked_body
                        .as_bytes()
                        .chunks(512)
                        .map(Bytes::copy_from_slice)
                        .collect();
                    async move {
                        Body::from_stream(stream::iter(chunks).map(Ok::<Bytes, std::io::Error>))
                    }
                }),
            )
            .route("/missing.m3u", get(|| async { StatusCode::NOT_FOUND }))
            .route(
                "/stalled.m3u",
                get(|| async {
                    Body::from_stream(
                        stream::once(async {
                            Ok::<Bytes, std::io::Error>(Bytes::from_static(b"#EXTM3U\n"))
                        })
                        .chain(stream::pending()),
                    )
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fixture listener");
        let addr = listener.local_addr().expect("fixture address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fixture server");
        });

        Self {
            base: Url::parse(&format!("http://{addr}/")).expect("fixture base url"),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> Url {
        self.base.join(path).expect("fixture route url")
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A playlist with `channels` entries spread over `groups` groups
pub fn playlist_content(channels: usize, groups: usize) -> String {
    let mut content = String::from("#EXTM3U\n");
    for i in 0..channels {
        content.push_str(&format!(
            "#EXTINF:-1 tvg-id=\"ch{i}\" tvg-logo=\"http://logo.example.com/{i}.png\" group-title=\"Group {}\",Channel {i}\nhttp://stream.example.com/live/{i}\n",
            i % groups
        ));
    }
    content
}
