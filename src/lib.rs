//! Resolves a YouTube channel handle and serves its recent uploads as JSON.
//!
//! - [`feed`] - Handle resolution and feed extraction
//! - [`server`] - The `/api/yt-feed` HTTP endpoint
//! - [`config`] - Optional TOML configuration

pub mod config;
pub mod feed;
pub mod server;
