//! Playlist content fetching over HTTP(S)
//!
//! A fetch returns a lazy stream of [`DownloadProgress`] events ending in
//! exactly one terminal event. Each fetcher runs one transfer at a time: a new
//! fetch cancels the previous transfer, whose stream then receives a terminal
//! `Cancelled` event and ends.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::HttpConfig;
use crate::errors::SourceError;
use crate::models::DownloadProgress;
use crate::utils::url::UrlUtils;

/// Progress events buffered between the transfer task and its consumer
const PROGRESS_BUFFER: usize = 32;

/// Upper bound for the initial body buffer reservation
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Retrieves raw playlist content with progress reporting
pub trait ContentFetcher: Send + Sync {
    /// Start fetching `url`. Nothing follows the first event with `completed = true`.
    fn fetch(&self, url: &Url) -> BoxStream<'static, DownloadProgress>;
}

pub struct HttpContentFetcher {
    client: Client,
    stall_timeout: Option<Duration>,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl HttpContentFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, SourceError> {
        let connect_timeout = config.connect_timeout().map_err(|e| SourceError::Client {
            message: e.to_string(),
        })?;
        let stall_timeout = config.stall_timeout().map_err(|e| SourceError::Client {
            message: e.to_string(),
        })?;

        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build().map_err(|e| SourceError::Client {
            message: e.to_string(),
        })?;

        Ok(Self::with_client(client, stall_timeout))
    }

    /// Use an existing client, e.g. one shared with other components
    pub fn with_client(client: Client, stall_timeout: Option<Duration>) -> Self {
        Self {
            client,
            stall_timeout,
            in_flight: Mutex::new(None),
        }
    }

    /// Register a token for a new transfer, cancelling the one it replaces
    fn supersede(&self, display_url: &str) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = match self.in_flight.lock() {
            Ok(mut slot) => slot.replace(token.clone()),
            Err(poisoned) => poisoned.into_inner().replace(token.clone()),
        };

        if let Some(previous) = previous {
            if !previous.is_cancelled() {
                debug!("Superseding in-flight transfer with fetch of {}", display_url);
            }
            previous.cancel();
        }

        token
    }

    async fn run_transfer(
        client: Client,
        url: Url,
        stall_timeout: Option<Duration>,
        token: CancellationToken,
        tx: mpsc::Sender<DownloadProgress>,
    ) {
        let display_url = UrlUtils::obfuscate_credentials(url.as_str());

        let terminal = tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("Transfer of {} cancelled", display_url);
                DownloadProgress::failed(SourceError::Cancelled { url: display_url })
            }
            result = Self::download(&client, &url, &display_url, stall_timeout, &tx) => match result {
                Ok(payload) => DownloadProgress::finished(payload),
                Err(e) => {
                    warn!("Transfer of {} failed: {}", display_url, e);
                    DownloadProgress::failed(e)
                }
            },
        };

        // The consumer may already be gone
        let _ = tx.send(terminal).await;
    }

    async fn download(
        client: &Client,
        url: &Url,
        display_url: &str,
        stall_timeout: Option<Duration>,
        tx: &mpsc::Sender<DownloadProgress>,
    ) -> Result<Bytes, SourceError> {
        info!("Connecting to playlist source {}", display_url);

        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SourceError::transport(display_url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Http {
                status: response.status().as_u16(),
                url: display_url.to_string(),
            });
        }

        let total_size = response.content_length().filter(|len| *len > 0);
        debug!(
            "Downloading {} ({})",
            display_url,
            total_size
                .map(|len| format!("{len} bytes"))
                .unwrap_or_else(|| "unknown length".to_string())
        );

        let mut content = BytesMut::with_capacity(total_size.unwrap_or(0).min(MAX_PREALLOCATION) as usize);
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        loop {
            let next = match stall_timeout {
                Some(limit) => tokio::time::timeout(limit, stream.next())
                    .await
                    .map_err(|_| SourceError::Stalled {
                        url: display_url.to_string(),
                        seconds: limit.as_secs(),
                    })?,
                None => stream.next().await,
            };

            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| SourceError::transport(display_url, e.to_string()))?;

            downloaded += chunk.len() as u64;
            content.extend_from_slice(&chunk);

            let fraction = total_size.map(|total| downloaded as f64 / total as f64);
            if tx.send(DownloadProgress::in_flight(fraction)).await.is_err() {
                return Err(SourceError::Cancelled {
                    url: display_url.to_string(),
                });
            }
        }

        info!("Downloaded {} bytes from {}", downloaded, display_url);
        Ok(content.freeze())
    }
}

impl ContentFetcher for HttpContentFetcher {
    fn fetch(&self, url: &Url) -> BoxStream<'static, DownloadProgress> {
        let display_url = UrlUtils::obfuscate_credentials(url.as_str());
        let token = self.supersede(&display_url);

        let client = self.client.clone();
        let url = url.clone();
        let stall_timeout = self.stall_timeout;

        // The transfer starts on first poll; dropping the stream cancels it
        stream::once(async move {
            let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
            let guard = token.clone().drop_guard();
            tokio::spawn(Self::run_transfer(client, url, stall_timeout, token, tx));
            progress_events(rx, guard)
        })
        .flatten()
        .boxed()
    }
}

/// Forward received events, ending after the first terminal one
fn progress_events(
    rx: mpsc::Receiver<DownloadProgress>,
    guard: DropGuard,
) -> BoxStream<'static, DownloadProgress> {
    stream::unfold(Some((rx, guard)), |state| async move {
        let (mut rx, guard) = state?;
        let event = rx.recv().await?;
        let next = (!event.is_terminal()).then_some((rx, guard));
        Some((event, next))
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_timeouts() {
        let config = HttpConfig {
            connect_timeout: Some("soon".to_string()),
            ..HttpConfig::default()
        };
        assert!(matches!(
            HttpContentFetcher::new(&config),
            Err(SourceError::Client { .. })
        ));
    }

    #[tokio::test]
    async fn test_supersede_cancels_previous_token() {
        let fetcher = HttpContentFetcher::new(&HttpConfig::default()).unwrap();
        let first = fetcher.supersede("http://a");
        assert!(!first.is_cancelled());

        let second = fetcher.supersede("http://b");
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_single_transport_error() {
        let config = HttpConfig {
            connect_timeout: Some("2s".to_string()),
            ..HttpConfig::default()
        };
        let fetcher = HttpContentFetcher::new(&config).unwrap();
        // Port 9 on localhost is discard; nothing should be listening there
        let url = Url::parse("http://127.0.0.1:9/list.m3u").unwrap();

        let events: Vec<DownloadProgress> = fetcher.fetch(&url).collect().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].completed);
        assert!(matches!(events[0].error, Some(SourceError::Transport { .. })));
        assert!(events[0].payload.is_none());
    }

    #[tokio::test]
    async fn test_dropping_stream_mid_transfer_cancels_it() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;
        use tokio::sync::oneshot;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (closed_tx, closed_rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100000\r\n\r\n#EXTM3U\n")
                .await
                .unwrap();
            // Returns once the client hangs up
            let mut rest = Vec::new();
            let _ = socket.read_to_end(&mut rest).await;
            let _ = closed_tx.send(());
        });

        let fetcher = HttpContentFetcher::new(&HttpConfig::default()).unwrap();
        let url = Url::parse(&format!("http://{addr}/list.m3u")).unwrap();
        let mut events = fetcher.fetch(&url);
        let first = events.next().await.unwrap();
        assert!(!first.completed);
        assert!(first.fraction.unwrap() < 1.0);

        drop(events);
        let token = fetcher.in_flight.lock().unwrap().clone().unwrap();
        assert!(token.is_cancelled());

        tokio::time::timeout(Duration::from_secs(5), closed_rx)
            .await
            .expect("transfer did not release the connection")
            .unwrap();
    }
}
