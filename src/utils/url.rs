//! URL utilities for consistent URL handling
//!
//! Playlist source URLs are validated here, channel media paths are inspected
//! for live-content detection, and URLs are obfuscated before they reach logs.

use regex::Regex;
use url::Url;

/// URL utilities for consistent URL handling
pub struct UrlUtils;

impl UrlUtils {
    /// Parse a playlist source URL
    ///
    /// The URL must be absolute and use the HTTP or HTTPS scheme.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use m3u_ingest::utils::url::UrlUtils;
    ///
    /// assert!(UrlUtils::parse_playlist_url("https://example.com/list.m3u").is_ok());
    /// assert!(UrlUtils::parse_playlist_url("example.com/list.m3u").is_err());
    /// ```
    pub fn parse_playlist_url(url: &str) -> Result<Url, String> {
        let trimmed = url.trim();
        let parsed = Url::parse(trimmed).map_err(|e| format!("Invalid URL '{trimmed}': {e}"))?;

        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            scheme => Err(format!(
                "Playlist URL must use HTTP or HTTPS protocol, got '{scheme}'"
            )),
        }
    }

    /// Parse a media reference from a playlist line
    ///
    /// Returns `None` for text that is not an absolute URL.
    pub fn parse_media_url(line: &str) -> Option<Url> {
        Url::parse(line.trim()).ok()
    }

    /// File extension of the last path segment, if any
    ///
    /// A leading dot (`/.hidden`) and a trailing dot (`/name.`) do not count
    /// as an extension.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use m3u_ingest::utils::url::UrlUtils;
    /// use url::Url;
    ///
    /// let vod = Url::parse("https://test.com/movies/1234.mp4").unwrap();
    /// assert_eq!(UrlUtils::path_extension(&vod), Some("mp4"));
    ///
    /// let live = Url::parse("https://test.com/live/1234").unwrap();
    /// assert_eq!(UrlUtils::path_extension(&live), None);
    /// ```
    pub fn path_extension(url: &Url) -> Option<&str> {
        let segment = url.path().rsplit('/').next()?;
        let dot = segment.rfind('.')?;
        if dot == 0 || dot + 1 == segment.len() {
            return None;
        }
        Some(&segment[dot + 1..])
    }

    /// Obfuscate credentials in URLs for safe logging
    ///
    /// Replaces userinfo and common credential query parameters with `****`.
    pub fn obfuscate_credentials(url: &str) -> String {
        let mut obfuscated = url.to_string();

        if let Ok(parsed) = Url::parse(url) {
            if !parsed.username().is_empty() || parsed.password().is_some() {
                let mut new_url = parsed.clone();
                let _ = new_url.set_username("****");
                let _ = new_url.set_password(Some("****"));
                obfuscated = new_url.to_string();
            }
        }

        let sensitive_params = ["username", "password", "user", "pass", "pwd", "passwd", "token"];

        for param in &sensitive_params {
            let pattern = format!(r"(?i)([?&]{}=)[^&]*", regex::escape(param));
            if let Ok(re) = Regex::new(&pattern) {
                obfuscated = re.replace_all(&obfuscated, "${1}****").to_string();
            }
        }

        obfuscated
    }
}
