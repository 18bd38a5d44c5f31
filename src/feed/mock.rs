//! In-memory [`Fetch`] for unit tests.

use super::fetcher::{Fetch, FetchError, Page};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

enum Canned {
    Page(Page),
    Fail(fn() -> FetchError),
}

/// Serves canned pages by exact URL and records every requested URL.
///
/// Unknown URLs answer 404 with an empty body.
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, Canned>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, status: StatusCode, body: &str) -> Self {
        self.pages
            .insert(url.to_owned(), Canned::Page(Page::new(status, body)));
        self
    }

    pub fn with_bytes(mut self, url: &str, status: StatusCode, body: Vec<u8>) -> Self {
        self.pages
            .insert(url.to_owned(), Canned::Page(Page::new(status, body)));
        self
    }

    /// Makes `url` fail at the transport level.
    pub fn with_failure(self, url: &str) -> Self {
        self.with_error(url, || FetchError::Timeout)
    }

    /// Makes `url` fail with the error built by `make`.
    pub fn with_error(mut self, url: &str, make: fn() -> FetchError) -> Self {
        self.pages.insert(url.to_owned(), Canned::Fail(make));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetch for MockFetcher {
    async fn get(&self, url: &Url) -> Result<Page, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.pages.get(url.as_str()) {
            Some(Canned::Page(page)) => Ok(page.clone()),
            Some(Canned::Fail(make)) => Err(make()),
            None => Ok(Page::new(StatusCode::NOT_FOUND, Vec::new())),
        }
    }
}
