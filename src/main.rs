//! Donation feed and media overlay client.
//!
//! Subscribes to the donation server's WebSocket, keeps the page state in
//! memory and optionally mirrors the rendered markup to a file:
//!
//!   overlay-client feed --url http://127.0.0.1:8080 --output feed.html
//!   overlay-client overlay --config overlay.json
//!   overlay-client test-donation --url http://127.0.0.1:8080

mod audio;
mod config;
mod error;
mod test_donation;
mod timer;
mod view;
mod ws;

#[cfg(test)]
mod mock_server;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use audio::LogAudio;
use config::{Config, PageKind};
use view::{FeedView, OverlayView, Page};
use ws::{Backoff, ConnectionManager};

const USAGE: &str =
    "usage: overlay-client <feed|overlay|test-donation> [--config PATH] [--url URL] [--output PATH]";

#[derive(Debug, PartialEq)]
enum Command {
    Page(PageKind),
    TestDonation,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("overlay_client=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, config) = parse_args(&args)?;

    match command {
        Command::TestDonation => {
            test_donation::trigger(&config).await?;
        }
        Command::Page(PageKind::Feed) => {
            let page = FeedView::new(&config);
            run_page(PageKind::Feed, &config, page).await?;
        }
        Command::Page(PageKind::Overlay) => {
            let page = OverlayView::new(&config, Box::new(LogAudio::default()));
            run_page(PageKind::Overlay, &config, page).await?;
        }
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<(Command, Config)> {
    let command = match args.first().map(String::as_str) {
        Some("feed") => Command::Page(PageKind::Feed),
        Some("overlay") => Command::Page(PageKind::Overlay),
        Some("test-donation") => Command::TestDonation,
        Some(other) => bail!("unknown command `{other}`\n{USAGE}"),
        None => bail!(USAGE),
    };

    let mut config = match parse_arg(args, "--config") {
        Some(path) => Config::load(&PathBuf::from(path))?,
        None => Config::default(),
    };
    if let Some(url) = parse_arg(args, "--url") {
        config.page_url = url;
    }
    if let Some(path) = parse_arg(args, "--output") {
        config.output_path = Some(PathBuf::from(path));
    }
    Ok((command, config))
}

fn parse_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

async fn run_page<P: Page + Send + 'static>(kind: PageKind, config: &Config, page: P) -> Result<()> {
    let url = config
        .endpoint(kind)
        .with_context(|| format!("cannot derive the {} endpoint", kind.name()))?;
    info!("Starting {} page against {}", kind.name(), url);

    let handle = ConnectionManager::new(url, Backoff::from_config(config), page)
        .with_output(config.output_path.clone())
        .with_connect_timeout(config.connect_timeout())
        .spawn();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutting down");
    handle.dispose();
    handle.join().await.context("connection manager panicked")?;
    Ok(())
}
