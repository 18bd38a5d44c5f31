use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use yt_feed::config::Config;
use yt_feed::feed::load_channel_feed;
use yt_feed::server::{run_server, AppState};

#[derive(Parser, Debug)]
#[command(name = "yt-feed", about = "Recent videos of a YouTube channel as JSON")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, value_name = "FILE", default_value = "yt-feed.toml")]
    config: PathBuf,

    /// Listen address (overrides `bind` from the config file)
    #[arg(long, value_name = "ADDR")]
    bind: Option<SocketAddr>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP endpoint (default)
    Serve,
    /// Resolve a handle once and print the feed JSON to stdout
    Fetch {
        /// Channel handle (`@name`) or channel id; defaults to the configured handle
        handle: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config).await,
        Command::Fetch { handle } => {
            let handle = handle.unwrap_or_else(|| config.default_handle.clone());
            let state = AppState::new(config).context("Failed to build HTTP client")?;

            let feed = load_channel_feed(&*state.fetcher, &state.config.base_url, &handle)
                .await
                .with_context(|| format!("Failed to load feed for {handle}"))?;

            let json = serde_json::to_string_pretty(&feed).context("Failed to encode feed")?;
            println!("{json}");
            Ok(())
        }
    }
}
