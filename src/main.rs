use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod gemini;
mod handler;
mod transcript;
mod tui;
mod ui;

use app::App;
use config::Config;
use gemini::GeminiClient;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_logging()?;

    // Resolve the key before touching the terminal so the error prints plainly.
    let api_key = config.resolve_api_key()?;
    let client = GeminiClient::new(config.endpoint(), &api_key, config.model());
    let mut app = App::new(client);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = tui::EventHandler::new();
    info!(model = app.model(), "starting chat session");

    while !app.should_quit {
        terminal.draw(|frame| ui::draw(frame, app))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event)?;
        }

        // Ticks arrive every 300ms, so a finished dispatch is collected
        // promptly even while the user is idle.
        app.poll_dispatch().await;
    }

    info!("chat session ended");
    Ok(())
}

/// Logs go to a file under the config directory; the alternate screen owns
/// stderr. `GEMCHAT_LOG` sets the filter, defaulting to `info`.
fn init_logging() -> Result<()> {
    let log_dir = Config::config_dir()?;
    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("gemchat.log"))?;

    let filter = EnvFilter::try_from_env("GEMCHAT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .with_target(false)
        .init();

    Ok(())
}
