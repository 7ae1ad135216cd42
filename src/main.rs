use std::env;

use anyhow::{Context, Result};
use log::{info, warn};

use a2a_directory::config::DirectorySettings;
use a2a_directory::directory::{DirectoryManager, DirectorySnapshot};
use a2a_directory::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let workspace_root = env::current_dir().context("Failed to resolve working directory")?;
    init_logging(&workspace_root)?;

    let settings = DirectorySettings::load(&workspace_root)?;
    let mut manager = DirectoryManager::from_settings(&settings)?;

    let report = manager
        .initialize(settings.default_agent_urls.clone())
        .wait()
        .await;
    info!(
        "Bootstrap finished: {} registered, {} failed",
        report.succeeded().count(),
        report.failed().count()
    );

    // Extra URLs on the command line are added after the defaults, in order.
    for url in env::args().skip(1) {
        if let Err(err) = manager.add_agent_by_url(&url).await {
            warn!("Skipping {}: {}", url.trim(), err);
        }
    }

    while let Some(event) = manager.poll_event() {
        if event.is_error() {
            eprintln!("{}", event.message());
        } else {
            println!("{}", event.message());
        }
    }

    print_directory(&manager.snapshot())
}

fn print_directory(snapshot: &DirectorySnapshot) -> Result<()> {
    if snapshot.agents.is_empty() {
        println!("No agents registered.");
        return Ok(());
    }
    let active_url = snapshot.active.as_ref().map(|card| card.url.as_str());
    for card in &snapshot.agents {
        let marker = if Some(card.url.as_str()) == active_url { "*" } else { " " };
        let metadata = serde_json::to_string(&card.metadata).context("Failed to render agent card")?;
        println!("{marker} {} <{}> {}", card.name, card.url, metadata);
    }
    Ok(())
}
