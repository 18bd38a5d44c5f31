//! Optional `yt-feed.toml` service configuration.
//!
//! Every key has a default, so an absent file runs the service against
//! `https://www.youtube.com` on `127.0.0.1:3000`.
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level service configuration.
///
/// Any subset of keys may be given; the rest take their [`Default`] values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP endpoint listens on.
    pub bind: SocketAddr,

    /// Origin for channel pages and the video feed.
    pub base_url: Url,

    /// Handle served when a request carries none.
    pub default_handle: String,

    /// User-agent sent on every outbound request.
    pub user_agent: String,

    /// Per-request timeout for outbound fetches, in seconds.
    pub fetch_timeout_secs: u64,

    /// Maximum accepted size of a fetched page or feed.
    pub max_body_bytes: usize,

    /// Retries for 429/5xx/transport failures. 0 = no retries.
    pub max_retries: u32,

    /// First retry delay; doubles with each attempt.
    pub retry_base_delay_ms: u64,

    /// Deadline for a whole request (resolve + extract). 0 = no deadline.
    pub request_deadline_secs: u64,

    /// `s-maxage` of successful responses.
    pub cache_max_age_secs: u64,

    /// `stale-while-revalidate` of successful responses.
    pub stale_while_revalidate_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            base_url: Url::parse("https://www.youtube.com").expect("default base URL is valid"),
            default_handle: "@nkoralage9386".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            fetch_timeout_secs: 30,
            max_body_bytes: crate::feed::DEFAULT_MAX_BODY,
            max_retries: 0,
            retry_base_delay_ms: 1000,
            request_deadline_secs: 60,
            cache_max_age_secs: 3600,
            stale_while_revalidate_secs: 18000,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 11] = [
        "bind",
        "base_url",
        "default_handle",
        "user_agent",
        "fetch_timeout_secs",
        "max_body_bytes",
        "max_retries",
        "retry_base_delay_ms",
        "request_deadline_secs",
        "cache_max_age_secs",
        "stale_while_revalidate_secs",
    ];

    /// Loads the service configuration from `path`.
    ///
    /// A missing or blank file yields the defaults. Keys outside
    /// [`Self::KNOWN_KEYS`] are logged and otherwise ignored.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = Self::read(path)? else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        };

        Self::warn_unknown_keys(&content);

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            bind = %config.bind,
            base_url = %config.base_url,
            default_handle = %config.default_handle,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// `None` when the file is absent or holds only whitespace.
    fn read(path: &Path) -> Result<Option<String>, ConfigError> {
        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if size > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "{} is {size} bytes (max {})",
                path.display(),
                Self::MAX_FILE_SIZE
            )));
        }

        match std::fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(content)),
            // Removed between the size check and the read
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn warn_unknown_keys(content: &str) {
        let Ok(table) = content.parse::<toml::Table>() else {
            return;
        };
        for key in table.keys() {
            if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            }
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// `None` when the deadline is disabled.
    pub fn request_deadline(&self) -> Option<Duration> {
        (self.request_deadline_secs > 0).then(|| Duration::from_secs(self.request_deadline_secs))
    }

    /// `Cache-Control` value for successful responses.
    pub fn cache_control(&self) -> String {
        format!(
            "s-maxage={}, stale-while-revalidate={}",
            self.cache_max_age_secs, self.stale_while_revalidate_secs
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
