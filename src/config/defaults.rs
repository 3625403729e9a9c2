/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./m3u-ingest.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// Ingestion defaults
pub const DEFAULT_PARSE_PROGRESS_INTERVAL: usize = 100;
pub const DEFAULT_CHANNEL_COMMIT_INTERVAL: usize = 1000;
pub const DEFAULT_GROUP_COMMIT_INTERVAL: usize = 10;
/// Deliberately unparseable so image loaders fail fast on channels without a logo
pub const DEFAULT_MISSING_LOGO_PLACEHOLDER: &str = "invalid-:+%$#@!~*|";

// HTTP defaults
pub const DEFAULT_USER_AGENT: &str = concat!("m3u-ingest/", env!("CARGO_PKG_VERSION"));
