use super::fetcher::{Fetch, FetchError};
use super::resolver::ChannelId;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const THUMBNAIL_HOST: &str = "https://i.ytimg.com/vi/";

/// Errors that can occur while fetching and reading a channel feed.
///
/// Individual malformed entries are never an error: they are dropped or
/// filled with defaults.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The feed request could not be completed
    #[error("Feed fetch failed: {0}")]
    Fetch(#[source] FetchError),
    /// The feed answered with a non-2xx status
    #[error("Feed fetch failed: {0}")]
    HttpStatus(u16),
    /// The feed body is not readable as text
    #[error("Feed parse failed: {0}")]
    Parse(String),
}

impl From<FetchError> for ExtractError {
    /// A body that broke off after the headers arrived is unreadable text,
    /// not a failed request.
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Body(_) | FetchError::IncompleteResponse { .. } => {
                ExtractError::Parse(e.to_string())
            }
            e => ExtractError::Fetch(e),
        }
    }
}

/// One video entry of a channel feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedEntry {
    pub id: String,
    pub title: String,
    pub published: String,
    pub link: String,
    #[serde(rename = "thumb")]
    pub thumbnail: String,
}

static ENTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<entry(?:\s[^>]*)?>(.*?)</entry>").expect("Invalid entry pattern")
});

static VIDEO_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<yt:videoId>(.*?)</yt:videoId>").expect("Invalid video id pattern")
});

/// Title text, optionally wrapped in CDATA.
static TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<title>(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?</title>").expect("Invalid title pattern")
});

static PUBLISHED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<published>(.*?)</published>").expect("Invalid published pattern")
});

static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<link rel="alternate" href="(.*?)""#).expect("Invalid link pattern")
});

static THUMBNAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<media:thumbnail url="(.*?)""#).expect("Invalid thumbnail pattern")
});

/// Returns the feed document URL for a channel.
pub fn feed_url(base: &Url, channel_id: &ChannelId) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend(["feeds", "videos.xml"]);
    }
    url.query_pairs_mut().append_pair("channel_id", channel_id.as_str());
    url
}

pub fn watch_url(video_id: &str) -> String {
    format!("{WATCH_URL}{video_id}")
}

pub fn thumbnail_url(video_id: &str) -> String {
    format!("{THUMBNAIL_HOST}{video_id}/hqdefault.jpg")
}

/// Iterates the entry segments of a feed document in document order.
///
/// Each call scans from the start of `xml`; nothing is retained between calls.
pub fn entry_segments(xml: &str) -> impl Iterator<Item = &str> {
    ENTRY_PATTERN
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

/// First capture of `pattern` within `segment`, as written.
fn capture<'a>(pattern: &Regex, segment: &'a str) -> Option<&'a str> {
    pattern
        .captures(segment)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Like [`capture`], trimmed. Empty counts as absent.
fn pick<'a>(pattern: &Regex, segment: &'a str) -> Option<&'a str> {
    capture(pattern, segment)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Extracts one entry from a single segment. Returns `None` without a video id.
///
/// Every field pattern runs against `segment` only, so a field missing from
/// this entry can never be filled from a neighbouring one.
pub fn parse_entry(segment: &str) -> Option<FeedEntry> {
    let id = pick(&VIDEO_ID_PATTERN, segment)?;

    Some(FeedEntry {
        id: id.to_owned(),
        title: capture(&TITLE_PATTERN, segment)
            .unwrap_or_default()
            .to_owned(),
        published: capture(&PUBLISHED_PATTERN, segment)
            .unwrap_or_default()
            .to_owned(),
        link: pick(&LINK_PATTERN, segment)
            .map(str::to_owned)
            .unwrap_or_else(|| watch_url(id)),
        thumbnail: pick(&THUMBNAIL_PATTERN, segment)
            .map(str::to_owned)
            .unwrap_or_else(|| thumbnail_url(id)),
    })
}

/// Parses every well-formed entry of a feed document, in document order.
///
/// Segments without a video id are skipped. A document with no entries
/// yields an empty `Vec`.
pub fn parse_feed(xml: &str) -> Vec<FeedEntry> {
    let mut skipped = 0usize;
    let entries: Vec<FeedEntry> = entry_segments(xml)
        .filter_map(|segment| {
            let entry = parse_entry(segment);
            if entry.is_none() {
                skipped += 1;
            }
            entry
        })
        .collect();

    if skipped > 0 {
        tracing::debug!(skipped = skipped, "Feed entries without a video id skipped");
    }

    entries
}

/// Fetches the feed document of `channel_id` and extracts its entries.
///
/// # Errors
///
/// - [`ExtractError::Fetch`] - the request itself failed
/// - [`ExtractError::HttpStatus`] - the feed answered with a non-2xx status
/// - [`ExtractError::Parse`] - the body broke off or is not valid UTF-8 text
pub async fn extract<F: Fetch>(
    fetcher: &F,
    base: &Url,
    channel_id: &ChannelId,
) -> Result<Vec<FeedEntry>, ExtractError> {
    let url = feed_url(base, channel_id);
    let page = fetcher.get(&url).await?;

    if !page.is_success() {
        return Err(ExtractError::HttpStatus(page.status.as_u16()));
    }

    let xml = page.text().map_err(|e| ExtractError::Parse(e.to_string()))?;
    let entries = parse_feed(xml);

    tracing::info!(channel_id = %channel_id, entries = entries.len(), "Extracted feed entries");
    Ok(entries)
}
