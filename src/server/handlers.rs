use axum::{
    extract::{RawQuery, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::feed::load_channel_feed;

/// Fixed tag on every logged request failure, for log searches.
pub const DIAGNOSTIC_TAG: &str = "YT_FEED_ERROR";

/// Query parameters of the feed endpoint.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FeedQuery {
    pub handle: Option<String>,
}

impl FeedQuery {
    /// Reads the first `handle` pair. Repeated and unknown parameters are
    /// ignored, so a query string can never fail the request.
    pub fn parse(raw: Option<&str>) -> Self {
        let handle = raw.and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "handle")
                .map(|(_, value)| value.into_owned())
        });
        Self { handle }
    }
}

/// `GET /api/yt-feed?handle=@name`
///
/// Resolves the handle (or the configured default when it is missing or
/// blank) and answers `{ channelId, items }` with shared-cache directives.
/// Failures answer `{ error }` and are logged under [`DIAGNOSTIC_TAG`].
pub async fn yt_feed(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> ApiResult<Response> {
    let handle = FeedQuery::parse(raw.as_deref())
        .handle
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| state.config.default_handle.clone());

    let work = load_channel_feed(&*state.fetcher, &state.config.base_url, &handle);

    let result = match state.config.request_deadline() {
        Some(deadline) => match tokio::time::timeout(deadline, work).await {
            Ok(result) => result.map_err(ApiError::from),
            Err(_) => Err(ApiError::DeadlineExceeded(deadline)),
        },
        None => work.await.map_err(ApiError::from),
    };

    match result {
        Ok(feed) => {
            tracing::debug!(
                handle = %handle,
                channel_id = %feed.channel_id,
                items = feed.items.len(),
                "Served channel feed"
            );
            Ok((
                [(header::CACHE_CONTROL, state.config.cache_control())],
                Json(feed),
            )
                .into_response())
        }
        Err(e) => {
            tracing::error!(
                tag = DIAGNOSTIC_TAG,
                handle = %handle,
                error = %e,
                "Channel feed request failed"
            );
            Err(e)
        }
    }
}
