//! M3U playlist parser
//!
//! Turns raw playlist bytes into ordered channel entries and the groups that
//! partition them. The parser performs no I/O and keeps no state between
//! calls: every call returns an immutable [`ParsedPlaylist`].
//!
//! # Line handling
//! - An optional `#EXTM3U` header (any case) on the first non-blank line is skipped
//! - `#EXTINF:` lines become the pending info, replacing any unconsumed one
//! - Other `#` lines are comments
//! - The first non-comment line after a pending info is its media reference
//! - Non-comment lines without a pending info are ignored

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::config::IngestionConfig;
use crate::config::defaults::{DEFAULT_MISSING_LOGO_PLACEHOLDER, DEFAULT_PARSE_PROGRESS_INTERVAL};
use crate::errors::{FormatError, FormatResult};
use crate::models::{ParseProgress, PlaylistChannel, PlaylistChannelGroup};
use crate::utils::url::UrlUtils;

pub const EXTM3U_HEADER: &str = "#EXTM3U";
pub const EXTINF_PREFIX: &str = "#EXTINF:";

/// Channel fields that EXTINF attributes can populate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeRole {
    Group,
    Logo,
}

impl AttributeRole {
    /// Key fragment used when no recognized key is present
    fn key_fragment(self) -> &'static str {
        match self {
            AttributeRole::Group => "group-",
            AttributeRole::Logo => "logo",
        }
    }
}

/// Recognized attribute keys in precedence order.
///
/// For each role the first key of this table present on the line wins. When
/// none is present, the first attribute in line order whose key contains the
/// role's fragment (`group-`, `logo`) is used instead.
pub const RECOGNIZED_ATTRIBUTES: &[(&str, AttributeRole)] = &[
    ("group-title", AttributeRole::Group),
    ("tvg-logo", AttributeRole::Logo),
    ("logo", AttributeRole::Logo),
];

/// Result of a successful parse
#[derive(Debug, Clone)]
pub struct ParsedPlaylist {
    /// Channels in file encounter order
    pub channels: Vec<PlaylistChannel>,
    /// One group per distinct group key, in first-seen order
    pub groups: Vec<PlaylistChannelGroup>,
    /// The final progress event that was emitted
    pub final_progress: ParseProgress,
}

/// Parses playlist content into channel entities
#[async_trait]
pub trait PlaylistParser: Send + Sync {
    /// Parse `content` into channels owned by `playlist_id`.
    ///
    /// `on_progress` receives periodic progress and exactly one final event
    /// with `fraction = 1.0` on success. Errors are terminal and no partial
    /// result is returned.
    async fn parse(
        &self,
        content: &[u8],
        playlist_id: Uuid,
        on_progress: &mut (dyn FnMut(ParseProgress) + Send),
    ) -> FormatResult<ParsedPlaylist>;
}

enum ScanState<'a> {
    AwaitingInfo,
    InfoPending(&'a str),
}

/// Fields extracted from one `#EXTINF:` line
#[derive(Debug, Default, PartialEq)]
struct ExtInf {
    duration_seconds: Option<u32>,
    display_name: Option<String>,
    group: Option<String>,
    logo: Option<String>,
    other_attributes: Vec<(String, String)>,
}

pub struct M3uParser {
    progress_interval: usize,
    missing_logo_placeholder: String,
}

impl M3uParser {
    pub fn new() -> Self {
        Self {
            progress_interval: DEFAULT_PARSE_PROGRESS_INTERVAL,
            missing_logo_placeholder: DEFAULT_MISSING_LOGO_PLACEHOLDER.to_string(),
        }
    }

    pub fn from_config(config: &IngestionConfig) -> Self {
        Self {
            progress_interval: config.parse_progress_interval.max(1),
            missing_logo_placeholder: config.missing_logo_placeholder.clone(),
        }
    }

    /// Split on any newline convention, trim, and drop blank lines
    fn content_lines(text: &str) -> Vec<&str> {
        text.split(|c| matches!(c, '\n' | '\r' | '\u{0085}' | '\u{2028}' | '\u{2029}'))
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    fn build_channel(&self, info_line: &str, media_line: &str, playlist_id: Uuid) -> PlaylistChannel {
        let extinf = Self::parse_extinf_line(info_line);
        let media_url = UrlUtils::parse_media_url(media_line);
        if media_url.is_none() {
            debug!("Media reference is not a URL, keeping entry without it: '{}'", media_line);
        }

        PlaylistChannel {
            id: Uuid::new_v4(),
            playlist_id,
            name: extinf.display_name,
            logo: Some(
                extinf
                    .logo
                    .unwrap_or_else(|| self.missing_logo_placeholder.clone()),
            ),
            duration_seconds: extinf.duration_seconds,
            group: extinf.group.unwrap_or_default(),
            media_url,
            attributes: extinf.other_attributes,
        }
    }

    /// Parse `#EXTINF:<duration> [key="value"]*,<display name>`
    fn parse_extinf_line(line: &str) -> ExtInf {
        let payload = line.strip_prefix(EXTINF_PREFIX).unwrap_or(line);
        let (head, display_name) = Self::split_head_and_name(payload);

        let mut tokens = Self::split_tokens(head).into_iter().peekable();
        let mut duration_seconds = None;
        if let Some(first) = tokens.peek() {
            if !first.contains('=') {
                duration_seconds = first
                    .parse::<i64>()
                    .ok()
                    .filter(|d| *d >= 0)
                    .and_then(|d| u32::try_from(d).ok());
                tokens.next();
            }
        }

        let attributes: Vec<(String, String)> = tokens
            .filter_map(|token| {
                let (key, value) = token.split_once('=')?;
                let key = key.trim();
                if key.is_empty() {
                    return None;
                }
                Some((key.to_string(), value.trim().trim_matches('"').to_string()))
            })
            .collect();

        let group_index = Self::resolve_role(&attributes, AttributeRole::Group);
        let logo_index = Self::resolve_role(&attributes, AttributeRole::Logo);

        let group = group_index.map(|i| attributes[i].1.clone());
        let logo = logo_index.map(|i| attributes[i].1.clone());
        let other_attributes = attributes
            .into_iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != group_index && Some(*i) != logo_index)
            .map(|(_, attribute)| attribute)
            .collect();

        let display_name = display_name.trim();
        ExtInf {
            duration_seconds,
            display_name: (!display_name.is_empty()).then(|| display_name.to_string()),
            group,
            logo,
            other_attributes,
        }
    }

    fn quotes_balanced(text: &str) -> bool {
        text.matches('"').count() % 2 == 0
    }

    /// Head is everything before the first comma outside quotes, the display
    /// name everything after the last one. Unbalanced quotes fall back to the
    /// first and last comma anywhere. Without any comma both are the whole
    /// payload.
    fn split_head_and_name(payload: &str) -> (&str, &str) {
        if Self::quotes_balanced(payload) {
            let mut in_quotes = false;
            let mut first = None;
            let mut last = None;
            for (i, ch) in payload.char_indices() {
                match ch {
                    '"' => in_quotes = !in_quotes,
                    ',' if !in_quotes => {
                        first.get_or_insert(i);
                        last = Some(i);
                    }
                    _ => {}
                }
            }
            if let (Some(first), Some(last)) = (first, last) {
                return (&payload[..first], &payload[last + 1..]);
            }
        }

        match (payload.find(','), payload.rfind(',')) {
            (Some(first), Some(last)) => (&payload[..first], &payload[last + 1..]),
            _ => (payload, payload),
        }
    }

    /// Whitespace-delimited tokens; whitespace inside double quotes does not
    /// split unless the quotes are unbalanced
    fn split_tokens(head: &str) -> Vec<String> {
        if !Self::quotes_balanced(head) {
            return head.split_whitespace().map(str::to_string).collect();
        }

        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;

        for ch in head.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                c if c.is_whitespace() && !in_quotes => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            tokens.push(current);
        }

        tokens
    }

    /// Index of the attribute filling `role`, see [`RECOGNIZED_ATTRIBUTES`]
    fn resolve_role(attributes: &[(String, String)], role: AttributeRole) -> Option<usize> {
        RECOGNIZED_ATTRIBUTES
            .iter()
            .filter(|(_, r)| *r == role)
            .find_map(|(key, _)| {
                attributes
                    .iter()
                    .position(|(k, _)| k.eq_ignore_ascii_case(key))
            })
            .or_else(|| {
                attributes
                    .iter()
                    .position(|(k, _)| k.to_ascii_lowercase().contains(role.key_fragment()))
            })
    }

    /// Partition channels by group key, keeping first-seen order
    fn group_channels(channels: &[PlaylistChannel], playlist_id: Uuid) -> Vec<PlaylistChannelGroup> {
        let mut groups: Vec<PlaylistChannelGroup> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for channel in channels {
            let position = *positions.entry(channel.group.as_str()).or_insert_with(|| {
                groups.push(PlaylistChannelGroup {
                    id: Uuid::new_v4(),
                    playlist_id,
                    name: channel.group.clone(),
                    channel_ids: Vec::new(),
                });
                groups.len() - 1
            });
            groups[position].channel_ids.push(channel.id);
        }

        groups
    }
}

impl Default for M3uParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaylistParser for M3uParser {
    async fn parse(
        &self,
        content: &[u8],
        playlist_id: Uuid,
        on_progress: &mut (dyn FnMut(ParseProgress) + Send),
    ) -> FormatResult<ParsedPlaylist> {
        let text = std::str::from_utf8(content).map_err(|e| {
            debug!("Playlist content is not valid UTF-8: {}", e);
            FormatError::InvalidFormat
        })?;

        let lines = Self::content_lines(text);
        if lines.is_empty() {
            return Err(FormatError::EmptyFile);
        }

        let total_lines = lines.len();
        let start = usize::from(lines[0].eq_ignore_ascii_case(EXTM3U_HEADER));
        info!(
            "Parsing M3U content with {} lines for playlist {}",
            total_lines, playlist_id
        );

        let mut channels: Vec<PlaylistChannel> = Vec::new();
        let mut state = ScanState::AwaitingInfo;

        for (index, line) in lines.iter().copied().enumerate().skip(start) {
            if line.starts_with(EXTINF_PREFIX) {
                if let ScanState::InfoPending(previous) = state {
                    trace!("Discarding EXTINF line without media reference: '{}'", previous);
                }
                state = ScanState::InfoPending(line);
                continue;
            }

            if line.starts_with('#') {
                continue;
            }

            match std::mem::replace(&mut state, ScanState::AwaitingInfo) {
                ScanState::InfoPending(info_line) => {
                    channels.push(self.build_channel(info_line, line, playlist_id));

                    if channels.len() % self.progress_interval == 0 {
                        debug!(
                            "Parsed {} channels for playlist {}",
                            channels.len(),
                            playlist_id
                        );
                        on_progress(ParseProgress {
                            fraction: index as f64 / total_lines as f64,
                            entries_so_far: channels.len(),
                        });
                        tokio::task::yield_now().await;
                    }
                }
                ScanState::AwaitingInfo => {
                    trace!("Ignoring line without preceding EXTINF: '{}'", line);
                }
            }
        }

        if channels.is_empty() {
            info!("No channel entries found for playlist {}", playlist_id);
            return Err(FormatError::InvalidFormat);
        }

        let groups = Self::group_channels(&channels, playlist_id);
        let final_progress = ParseProgress {
            fraction: 1.0,
            entries_so_far: channels.len(),
        };
        on_progress(final_progress);

        info!(
            "M3U parsing completed for playlist {}: {} channels in {} groups",
            playlist_id,
            channels.len(),
            groups.len()
        );

        Ok(ParsedPlaylist {
            channels,
            groups,
            final_progress,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    async fn parse_with(
        parser: &M3uParser,
        content: &str,
    ) -> (FormatResult<ParsedPlaylist>, Vec<ParseProgress>) {
        let mut events = Vec::new();
        let result = parser
            .parse(content.as_bytes(), Uuid::new_v4(), &mut |p| events.push(p))
            .await;
        (result, events)
    }

    async fn parse(content: &str) -> (FormatResult<ParsedPlaylist>, Vec<ParseProgress>) {
        parse_with(&M3uParser::new(), content).await
    }

    fn numbered_playlist(count: usize) -> String {
        let mut content = String::from("#EXTM3U\n");
        for i in 0..count {
            content.push_str(&format!(
                "#EXTINF:-1 group-title=\"G{}\",Channel {}\nhttp://stream/{}\n",
                i % 7,
                i,
                i
            ));
        }
        content
    }

    #[tokio::test]
    async fn test_attribute_extraction() {
        let (result, _) = parse(
            "#EXTINF:-1 tvg-logo=\"http://x/y.png\" group-title=\"News\",Channel A\nhttp://stream/1\n",
        )
        .await;
        let parsed = result.unwrap();
        let channel = &parsed.channels[0];

        assert_eq!(channel.duration_seconds, None);
        assert_eq!(channel.logo.as_deref(), Some("http://x/y.png"));
        assert_eq!(channel.group, "News");
        assert_eq!(channel.name.as_deref(), Some("Channel A"));
        assert_eq!(
            channel.media_url.as_ref().map(|u| u.as_str()),
            Some("http://stream/1")
        );
    }

    #[rstest]
    #[case("#EXTINF:120,Name", Some(120))]
    #[case("#EXTINF:-1,Name", None)]
    #[case("#EXTINF:0,Name", Some(0))]
    #[case("#EXTINF:abc,Name", None)]
    #[case("#EXTINF:12.5,Name", None)]
    #[tokio::test]
    async fn test_duration_parsing(#[case] info: &str, #[case] expected: Option<u32>) {
        let (result, _) = parse(&format!("{info}\nhttp://stream/1")).await;
        let parsed = result.unwrap();
        assert_eq!(parsed.channels[0].duration_seconds, expected);
        assert_eq!(parsed.channels[0].name.as_deref(), Some("Name"));
    }

    #[rstest]
    #[case("")]
    #[case("   \n\t\n\r\n  ")]
    #[tokio::test]
    async fn test_blank_input_is_empty_file(#[case] content: &str) {
        let (result, events) = parse(content).await;
        assert_eq!(result.unwrap_err(), FormatError::EmptyFile);
        assert!(events.is_empty());
    }

    #[rstest]
    #[case("#EXTM3U\n#FOO\n")]
    #[case("#EXTM3U\n#EXTINF:-1,Dangling\n")]
    #[case("http://stream/1\nhttp://stream/2\n")]
    #[tokio::test]
    async fn test_no_entries_is_invalid_format(#[case] content: &str) {
        let (result, events) = parse(content).await;
        assert_eq!(result.unwrap_err(), FormatError::InvalidFormat);
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_invalid_format() {
        let mut events = Vec::new();
        let result = M3uParser::new()
            .parse(&[0xff, 0xfe, 0x00, 0x23], Uuid::new_v4(), &mut |p| events.push(p))
            .await;
        assert_eq!(result.unwrap_err(), FormatError::InvalidFormat);
    }

    #[tokio::test]
    async fn test_header_is_case_insensitive_and_optional() {
        let body = "#EXTINF:-1,One\nhttp://stream/1\n";
        for content in [format!("#extm3u\n{body}"), body.to_string()] {
            let (result, _) = parse(&content).await;
            assert_eq!(result.unwrap().channels.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_newline_conventions_and_whitespace() {
        let content = "  #EXTM3U  \r\n\r\n  #EXTINF:10,One  \r  http://stream/1  \n#EXTINF:20,Two\r\nhttp://stream/2";
        let (result, _) = parse(content).await;
        let parsed = result.unwrap();
        assert_eq!(parsed.channels.len(), 2);
        assert_eq!(parsed.channels[0].duration_seconds, Some(10));
        assert_eq!(parsed.channels[1].name.as_deref(), Some("Two"));
    }

    #[tokio::test]
    async fn test_pending_info_is_overwritten_and_comments_ignored() {
        let content = "#EXTM3U\n#EXTINF:-1,Lost\n#EXTVLCOPT:http-user-agent=x\n#EXTINF:-1,Kept\nhttp://stream/1\nhttp://stream/orphan\n";
        let (result, _) = parse(content).await;
        let parsed = result.unwrap();
        assert_eq!(parsed.channels.len(), 1);
        assert_eq!(parsed.channels[0].name.as_deref(), Some("Kept"));
    }

    #[tokio::test]
    async fn test_unparsable_media_url_still_produces_entry() {
        let (result, _) = parse("#EXTINF:-1,Local\nvideos/local file.ts\n").await;
        let parsed = result.unwrap();
        assert_eq!(parsed.channels.len(), 1);
        assert!(parsed.channels[0].media_url.is_none());
    }

    #[tokio::test]
    async fn test_missing_logo_and_group_defaults() {
        let (result, _) = parse("#EXTINF:-1 tvg-id=\"a.b\" broken-token,Plain\nhttp://stream/1\n").await;
        let channel = &result.unwrap().channels[0];
        assert_eq!(channel.group, "");
        assert_eq!(channel.logo.as_deref(), Some(DEFAULT_MISSING_LOGO_PLACEHOLDER));
        assert_eq!(
            channel.attributes,
            vec![("tvg-id".to_string(), "a.b".to_string())]
        );
    }

    #[tokio::test]
    async fn test_logo_placeholder_from_config() {
        let config = IngestionConfig {
            missing_logo_placeholder: "no-logo".to_string(),
            ..IngestionConfig::default()
        };
        let parser = M3uParser::from_config(&config);
        let (result, _) = parse_with(&parser, "#EXTINF:-1,Plain\nhttp://stream/1\n").await;
        assert_eq!(result.unwrap().channels[0].logo.as_deref(), Some("no-logo"));
    }

    #[tokio::test]
    async fn test_attribute_precedence() {
        // Exact keys win over fragment matches regardless of line order
        let content = "#EXTINF:-1 custom-logo=\"a.png\" group-name=\"Fallback\" tvg-logo=\"b.png\" group-title=\"Exact\",Ch\nhttp://stream/1\n";
        let (result, _) = parse(content).await;
        let channel = &result.unwrap().channels[0];
        assert_eq!(channel.logo.as_deref(), Some("b.png"));
        assert_eq!(channel.group, "Exact");

        // Without exact keys the first fragment match in line order wins
        let content = "#EXTINF:-1 x-logo=\"first.png\" y-logo=\"second.png\" my-group-id=\"7\",Ch\nhttp://stream/1\n";
        let (result, _) = parse(content).await;
        let channel = &result.unwrap().channels[0];
        assert_eq!(channel.logo.as_deref(), Some("first.png"));
        assert_eq!(channel.group, "7");
        assert_eq!(
            channel.attributes,
            vec![("y-logo".to_string(), "second.png".to_string())]
        );
    }

    #[tokio::test]
    async fn test_quoted_values_with_spaces_and_commas() {
        let content = "#EXTINF:-1 group-title=\"Sports, HD\" tvg-logo=\"http://x/a b.png\",Sky Sports 1\nhttp://stream/1\n";
        let (result, _) = parse(content).await;
        let channel = &result.unwrap().channels[0];
        assert_eq!(channel.group, "Sports, HD");
        assert_eq!(channel.logo.as_deref(), Some("http://x/a b.png"));
        assert_eq!(channel.name.as_deref(), Some("Sky Sports 1"));
    }

    #[rstest]
    #[case("#EXTINF:-1 tvg-name=\"Movie 12\"\" group-title=\"Films\",Movie", "Movie", "Films")]
    #[case("#EXTINF:-1 group-title=\"News\",TV 5\" Screen, Extra", "Extra", "News")]
    #[case("#EXTINF:-1 tvg-name=\"Open group-title=\"Kids\",Cartoons", "Cartoons", "Kids")]
    #[tokio::test]
    async fn test_unbalanced_quotes_fall_back_to_plain_split(
        #[case] info: &str,
        #[case] name: &str,
        #[case] group: &str,
    ) {
        let (result, _) = parse(&format!("{info}\nhttp://stream/1\n")).await;
        let channel = &result.unwrap().channels[0];
        assert_eq!(channel.name.as_deref(), Some(name));
        assert_eq!(channel.group, group);
        assert_eq!(channel.media_url.as_ref().map(|u| u.as_str()), Some("http://stream/1"));
    }

    #[tokio::test]
    async fn test_grouping_partitions_entries() {
        let (result, _) = parse(&numbered_playlist(50)).await;
        let parsed = result.unwrap();

        let member_count: usize = parsed.groups.iter().map(|g| g.channel_ids.len()).sum();
        assert_eq!(member_count, parsed.channels.len());

        let unique_members: HashSet<Uuid> = parsed
            .groups
            .iter()
            .flat_map(|g| g.channel_ids.iter().copied())
            .collect();
        assert_eq!(unique_members.len(), parsed.channels.len());

        let names: HashSet<&str> = parsed.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names.len(), parsed.groups.len());

        let group_order: Vec<&str> = parsed.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(group_order, vec!["G0", "G1", "G2", "G3", "G4", "G5", "G6"]);

        for group in &parsed.groups {
            let expected: Vec<Uuid> = parsed
                .channels
                .iter()
                .filter(|c| c.group == group.name)
                .map(|c| c.id)
                .collect();
            assert_eq!(group.channel_ids, expected);
        }
    }

    #[tokio::test]
    async fn test_ungrouped_channels_share_empty_group() {
        let content = "#EXTINF:-1,A\nhttp://s/1\n#EXTINF:-1 group-title=\"News\",B\nhttp://s/2\n#EXTINF:-1,C\nhttp://s/3\n";
        let (result, _) = parse(content).await;
        let parsed = result.unwrap();
        assert_eq!(parsed.groups.len(), 2);
        assert_eq!(parsed.groups[0].name, "");
        assert_eq!(parsed.groups[0].channel_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_progress_events() {
        let (result, events) = parse(&numbered_playlist(250)).await;
        let parsed = result.unwrap();

        let counts: Vec<usize> = events.iter().map(|e| e.entries_so_far).collect();
        assert_eq!(counts, vec![100, 200, 250]);
        assert!(counts.windows(2).all(|w| w[0] <= w[1]));
        assert!(events.iter().all(|e| (0.0..=1.0).contains(&e.fraction)));

        let last = events.last().unwrap();
        assert_eq!(last.fraction, 1.0);
        assert_eq!(last.entries_so_far, 250);
        assert_eq!(parsed.final_progress, *last);
    }

    #[tokio::test]
    async fn test_single_final_event_for_small_playlist() {
        let (result, events) = parse(&numbered_playlist(3)).await;
        assert!(result.is_ok());
        assert_eq!(
            events,
            vec![ParseProgress {
                fraction: 1.0,
                entries_so_far: 3
            }]
        );
    }

    #[tokio::test]
    async fn test_channels_owned_by_playlist() {
        let playlist_id = Uuid::new_v4();
        let parsed = M3uParser::new()
            .parse(numbered_playlist(5).as_bytes(), playlist_id, &mut |_| {})
            .await
            .unwrap();
        assert!(parsed.channels.iter().all(|c| c.playlist_id == playlist_id));
        assert!(parsed.groups.iter().all(|g| g.playlist_id == playlist_id));
    }
}
