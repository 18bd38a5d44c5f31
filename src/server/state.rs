use std::sync::Arc;

use crate::config::Config;
use crate::feed::{HttpFetcher, Retrying};

/// Fetch stack used by the endpoint: reqwest with optional retries.
pub type Upstream = Retrying<HttpFetcher>;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<Upstream>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Builds the outbound client from `config`.
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let http = HttpFetcher::new(
            &config.user_agent,
            config.fetch_timeout(),
            config.max_body_bytes,
        )?;
        let fetcher = Retrying::new(http, config.max_retries, config.retry_base_delay());

        Ok(Self {
            fetcher: Arc::new(fetcher),
            config: Arc::new(config),
        })
    }
}
