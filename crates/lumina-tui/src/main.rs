mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use std::sync::Arc;

use anyhow::Result;
use lumina_core::{Catalog, Config};
use tracing::{info, warn};

use app::App;
use tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    // Environment first so RUST_LOG and API keys from .env are visible
    let dotenv = dotenvy::dotenv();
    let _log_guard = logging::init();
    info!(version = env!("CARGO_PKG_VERSION"), "starting Lumina");
    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => warn!(error = %err, "could not read .env"),
    }

    let config_path = Config::get_config_path().ok();
    let config = match &config_path {
        Some(path) => Config::load_from(path).unwrap_or_else(|err| {
            warn!(error = %err, path = %path.display(), "ignoring unreadable config");
            Config::new()
        }),
        None => Config::new(),
    };

    let catalog = Arc::new(Catalog::builtin());
    let mut app = App::new(catalog, config, config_path);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    if let Err(err) = &result {
        tracing::error!(error = %err, "Lumina exited with an error");
    }
    info!("Lumina closed");
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }

        app.poll_chat_task().await;
    }
    Ok(())
}
