use super::fetcher::Fetch;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

const CHANNEL_ID_PREFIX: &str = "UC";
const CHANNEL_ID_SUFFIX_LEN: usize = 22;

/// Errors that can occur while resolving a handle to a channel id.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The handle is empty once whitespace and the leading `@` are removed
    #[error("invalid handle: {0:?} is empty")]
    InvalidHandle(String),
    /// No candidate page yielded a channel id
    #[error("channelId not found")]
    NotFound,
}

/// A canonical channel identifier: `UC` followed by 22 characters of
/// `[0-9A-Za-z_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Returns `Some` if `s` has the canonical channel id shape.
    pub fn parse(s: &str) -> Option<Self> {
        is_channel_id(s).then(|| Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_channel_id(s: &str) -> bool {
    match s.strip_prefix(CHANNEL_ID_PREFIX) {
        Some(suffix) => {
            suffix.len() == CHANNEL_ID_SUFFIX_LEN
                && suffix
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        }
        None => false,
    }
}

/// One way a channel page may embed its channel id.
struct ExtractionPattern {
    name: &'static str,
    regex: Regex,
    group: usize,
}

impl ExtractionPattern {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("channel id pattern must compile"),
            group: 1,
        }
    }

    fn find<'a>(&self, body: &'a str) -> Option<&'a str> {
        self.regex
            .captures(body)
            .and_then(|caps| caps.get(self.group))
            .map(|m| m.as_str())
            .filter(|id| !id.is_empty())
    }
}

/// Patterns tried against every candidate page, most authoritative first.
/// Several of these serialized forms can appear in the same document.
static EXTRACTION_PATTERNS: LazyLock<Vec<ExtractionPattern>> = LazyLock::new(|| {
    vec![
        ExtractionPattern::new("channelId", r#""channelId":"(UC[0-9A-Za-z_-]{22})""#),
        ExtractionPattern::new("externalId", r#""externalId":"(UC[0-9A-Za-z_-]{22})""#),
        ExtractionPattern::new(
            "canonical",
            r#"<link rel="canonical" href="https://www\.youtube\.com/channel/(UC[0-9A-Za-z_-]{22})""#,
        ),
    ]
});

/// Strips surrounding whitespace and one leading `@`.
fn normalize_handle(handle: &str) -> &str {
    let trimmed = handle.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed)
}

fn channel_page(base: &Url, handle: &str, tab: Option<&str>, locale: Option<&str>) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(&format!("@{handle}"));
        if let Some(tab) = tab {
            segments.push(tab);
        }
    }
    if let Some(hl) = locale {
        url.query_pairs_mut().append_pair("hl", hl);
    }
    url
}

/// Builds the ordered candidate pages for a normalized handle.
///
/// Different page variants embed the id reliably for different channel
/// configurations; the order puts the most commonly successful first.
pub fn candidate_sources(base: &Url, handle: &str) -> Vec<Url> {
    vec![
        channel_page(base, handle, None, None),
        channel_page(base, handle, Some("about"), None),
        channel_page(base, handle, Some("videos"), None),
        channel_page(base, handle, None, Some("en")),
        channel_page(base, handle, Some("about"), Some("en")),
    ]
}

/// Applies the extraction patterns in order and returns the first id found.
pub fn find_channel_id(body: &str) -> Option<ChannelId> {
    EXTRACTION_PATTERNS.iter().find_map(|pattern| {
        pattern.find(body).and_then(|id| {
            tracing::trace!(pattern = pattern.name, id = id, "Pattern matched");
            ChannelId::parse(id)
        })
    })
}

/// Resolves a handle (`@name`, `name`, or an existing channel id) to a
/// canonical [`ChannelId`].
///
/// A handle that already has the channel id shape is returned without any
/// network access. Otherwise the candidate pages are fetched one at a time,
/// in order, and the first page whose body yields an id wins; later pages
/// are never requested. A transport failure on one page counts as a miss.
///
/// # Errors
///
/// - [`ResolveError::InvalidHandle`] if the handle is empty after normalization
/// - [`ResolveError::NotFound`] if every candidate page was exhausted
pub async fn resolve<F: Fetch>(
    fetcher: &F,
    base: &Url,
    handle: &str,
) -> Result<ChannelId, ResolveError> {
    if let Some(id) = ChannelId::parse(handle.trim()) {
        return Ok(id);
    }

    let name = normalize_handle(handle);
    if name.is_empty() {
        return Err(ResolveError::InvalidHandle(handle.to_owned()));
    }

    for url in candidate_sources(base, name) {
        let page = match fetcher.get(&url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Candidate page fetch failed, trying next");
                continue;
            }
        };

        if let Some(id) = find_channel_id(&page.text_lossy()) {
            tracing::info!(handle = name, url = %url, channel_id = %id, "Resolved channel id");
            return Ok(id);
        }

        tracing::debug!(url = %url, status = %page.status, "No channel id on candidate page");
    }

    Err(ResolveError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::mock::MockFetcher;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use reqwest::StatusCode;

    const ID: &str = "UCabcdefghijklmnopqrstuv";
    const OTHER_ID: &str = "UC0123456789_-ABCDEFGHIJ";

    fn base() -> Url {
        Url::parse("https://www.youtube.com").unwrap()
    }

    fn page_with(field: &str, id: &str) -> String {
        format!(r#"<html><script>var ytInitialData = {{"{field}":"{id}","title":"x"}};</script></html>"#)
    }

    // --- Shape checks ---

    #[test]
    fn test_channel_id_shape() {
        assert!(ChannelId::parse(ID).is_some());
        assert!(ChannelId::parse(OTHER_ID).is_some());
        assert!(ChannelId::parse("UCshort").is_none());
        assert!(ChannelId::parse("UCabcdefghijklmnopqrstuvw").is_none()); // 23-char suffix
        assert!(ChannelId::parse("UCabcdefghijklmnopqrstu!").is_none());
        assert!(ChannelId::parse("XXabcdefghijklmnopqrstuv").is_none());
        assert!(ChannelId::parse("").is_none());
    }

    #[test]
    fn test_channel_id_serializes_as_string() {
        let id = ChannelId::parse(ID).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), format!("\"{ID}\""));
    }

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle("@somebody"), "somebody");
        assert_eq!(normalize_handle("somebody"), "somebody");
        assert_eq!(normalize_handle("  @somebody "), "somebody");
        assert_eq!(normalize_handle("@@twice"), "@twice");
        assert_eq!(normalize_handle("@"), "");
    }

    // --- Candidate sources ---

    #[test]
    fn test_candidate_sources_order() {
        let urls: Vec<String> = candidate_sources(&base(), "somebody")
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://www.youtube.com/@somebody",
                "https://www.youtube.com/@somebody/about",
                "https://www.youtube.com/@somebody/videos",
                "https://www.youtube.com/@somebody?hl=en",
                "https://www.youtube.com/@somebody/about?hl=en",
            ]
        );
    }

    #[test]
    fn test_candidate_sources_encode_handle_as_one_segment() {
        let urls = candidate_sources(&base(), "a b/c");
        assert_eq!(urls[0].as_str(), "https://www.youtube.com/@a%20b%2Fc");
        assert_eq!(urls[1].as_str(), "https://www.youtube.com/@a%20b%2Fc/about");
    }

    // --- Pattern cascade ---

    #[test]
    fn test_find_channel_id_each_pattern() {
        assert_eq!(
            find_channel_id(&page_with("channelId", ID)).map(|c| c.to_string()),
            Some(ID.to_owned())
        );
        assert_eq!(
            find_channel_id(&page_with("externalId", ID)).map(|c| c.to_string()),
            Some(ID.to_owned())
        );
        let canonical =
            format!(r#"<head><link rel="canonical" href="https://www.youtube.com/channel/{ID}"></head>"#);
        assert_eq!(
            find_channel_id(&canonical).map(|c| c.to_string()),
            Some(ID.to_owned())
        );
    }

    #[test]
    fn test_find_channel_id_prefers_channel_id_field() {
        // externalId appears first in the document but channelId is the preferred pattern
        let body = format!(
            "{}{}",
            page_with("externalId", OTHER_ID),
            page_with("channelId", ID)
        );
        assert_eq!(find_channel_id(&body).unwrap().as_str(), ID);
    }

    #[test]
    fn test_find_channel_id_rejects_wrong_length() {
        assert!(find_channel_id(&page_with("channelId", "UCtooshort")).is_none());
        assert!(find_channel_id("<html>nothing here</html>").is_none());
    }

    // --- resolve ---

    #[tokio::test]
    async fn test_resolve_canonical_id_without_network() {
        let fetcher = MockFetcher::new();
        let id = resolve(&fetcher, &base(), ID).await.unwrap();
        assert_eq!(id.as_str(), ID);
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_empty_handles_rejected() {
        let fetcher = MockFetcher::new();
        for handle in ["", "@", "  ", " @ "] {
            let result = resolve(&fetcher, &base(), handle).await;
            assert!(
                matches!(result, Err(ResolveError::InvalidHandle(_))),
                "handle {handle:?} should be invalid"
            );
        }
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_stops_at_first_matching_source() {
        let fetcher = MockFetcher::new()
            .with_page(
                "https://www.youtube.com/@somebody",
                StatusCode::OK,
                "<html>consent wall</html>",
            )
            .with_page(
                "https://www.youtube.com/@somebody/about",
                StatusCode::OK,
                "<html>still nothing</html>",
            )
            .with_page(
                "https://www.youtube.com/@somebody/videos",
                StatusCode::OK,
                &page_with("externalId", ID),
            )
            .with_page(
                "https://www.youtube.com/@somebody?hl=en",
                StatusCode::OK,
                &page_with("channelId", OTHER_ID),
            );

        let id = resolve(&fetcher, &base(), "@somebody").await.unwrap();
        assert_eq!(id.as_str(), ID);
        assert_eq!(
            fetcher.calls(),
            vec![
                "https://www.youtube.com/@somebody",
                "https://www.youtube.com/@somebody/about",
                "https://www.youtube.com/@somebody/videos",
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_network_failure_moves_to_next_source() {
        let fetcher = MockFetcher::new()
            .with_failure("https://www.youtube.com/@somebody")
            .with_page(
                "https://www.youtube.com/@somebody/about",
                StatusCode::OK,
                &page_with("channelId", ID),
            );

        let id = resolve(&fetcher, &base(), "somebody").await.unwrap();
        assert_eq!(id.as_str(), ID);
        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_not_found_after_all_sources() {
        let fetcher = MockFetcher::new().with_failure("https://www.youtube.com/@ghost/videos");

        let result = resolve(&fetcher, &base(), "@ghost").await;
        let err = result.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound));
        assert_eq!(err.to_string(), "channelId not found");
        assert_eq!(fetcher.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_resolve_matches_error_status_pages() {
        let fetcher = MockFetcher::new().with_page(
            "https://www.youtube.com/@somebody",
            StatusCode::NOT_FOUND,
            &page_with("channelId", ID),
        );

        let id = resolve(&fetcher, &base(), "@somebody").await.unwrap();
        assert_eq!(id.as_str(), ID);
    }

    #[tokio::test]
    async fn test_resolve_uc_prefixed_handle_is_not_trusted_blindly() {
        // Starts with UC but is not id-shaped: treated as a handle and looked up
        let fetcher = MockFetcher::new().with_page(
            "https://www.youtube.com/@UCLA",
            StatusCode::OK,
            &page_with("channelId", ID),
        );

        let id = resolve(&fetcher, &base(), "UCLA").await.unwrap();
        assert_eq!(id.as_str(), ID);
        assert_eq!(fetcher.calls(), vec!["https://www.youtube.com/@UCLA"]);
    }

    proptest! {
        #[test]
        fn prop_canonical_ids_round_trip(suffix in "[0-9A-Za-z_-]{22}") {
            let handle = format!("UC{suffix}");
            let fetcher = MockFetcher::new();
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let id = rt.block_on(resolve(&fetcher, &base(), &handle)).unwrap();
            prop_assert_eq!(id.as_str(), handle.as_str());
            prop_assert!(fetcher.calls().is_empty());
        }

        #[test]
        fn prop_find_channel_id_never_panics(body in ".{0,512}") {
            let _ = find_channel_id(&body);
        }
    }
}
