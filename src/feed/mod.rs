//! Channel feed pipeline: handle resolution and feed extraction.
//!
//! A request flows through two stages, both driven by an injected [`Fetch`]:
//!
//! - **Resolution**: turn a handle (`@name`) into a canonical channel id by
//!   probing several renderings of the channel page
//! - **Extraction**: fetch the channel's video feed and pull entries out of
//!   it segment by segment
//!
//! # Architecture
//!
//! - [`fetcher`] - The fetch capability, its reqwest implementation and a retry wrapper
//! - [`resolver`] - Ordered candidate pages × ordered extraction patterns, first match wins
//! - [`extractor`] - Segment-scoped pattern extraction of feed entries
//!
//! Neither stage uses a markup parser; both work on substrings because the
//! upstream documents have no stable schema.
//!
//! # Example
//!
//! ```ignore
//! use yt_feed::feed::{load_channel_feed, HttpFetcher};
//!
//! let fetcher = HttpFetcher::new("Mozilla/5.0", timeout, max_body)?;
//! let feed = load_channel_feed(&fetcher, &base_url, "@somebody").await?;
//! println!("{} has {} videos", feed.channel_id, feed.items.len());
//! ```

mod extractor;
mod fetcher;
#[cfg(test)]
mod mock;
mod resolver;

pub use extractor::{extract, feed_url, parse_feed, ExtractError, FeedEntry};
pub use fetcher::{Fetch, FetchError, HttpFetcher, Page, Retrying, DEFAULT_MAX_BODY};
pub use resolver::{candidate_sources, resolve, ChannelId, ResolveError};

use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Any failure of the channel feed pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// A resolved channel together with its recent entries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelFeed {
    pub channel_id: ChannelId,
    pub items: Vec<FeedEntry>,
}

/// Resolves `handle` and extracts the channel's feed.
///
/// The resolved id is used for exactly one feed fetch. No partial result is
/// returned on failure.
pub async fn load_channel_feed<F: Fetch>(
    fetcher: &F,
    base: &Url,
    handle: &str,
) -> Result<ChannelFeed, Error> {
    let channel_id = resolve(fetcher, base, handle).await?;
    let items = extract(fetcher, base, &channel_id).await?;
    Ok(ChannelFeed { channel_id, items })
}
