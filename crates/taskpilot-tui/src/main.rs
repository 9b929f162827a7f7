use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use taskpilot_core::{AzureClient, Config};
use tracing::{info, warn};

mod app;
mod handler;
mod logging;
mod markdown;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "taskpilot", version)]
#[command(about = "Chat with an Azure OpenAI deployment about your goals and tasks")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the Azure OpenAI endpoint from the config file
    #[arg(long)]
    endpoint: Option<String>,
    /// Directory for the rolling log file
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load().context("failed to load config")?,
    };
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = Some(endpoint);
    }

    let log_dir = cli
        .log_dir
        .or_else(|| config.log_dir.clone())
        .unwrap_or_else(logging::default_log_dir);
    let _log_guard = logging::init_tracing(&log_dir)?;

    let client = AzureClient::from_config(&config);
    info!(url = client.url(), "starting taskpilot");
    if !client.has_credential() {
        warn!("no API key configured; submissions will fail until one is set");
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, client).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut Tui, client: AzureClient) -> Result<()> {
    let mut events = EventHandler::new();
    let mut app = App::new(client, events.sender());

    while !app.should_quit {
        app.sync_view();
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(&mut app, event)?;
    }

    info!("exiting");
    Ok(())
}
