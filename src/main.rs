use anyhow::Result;

mod api;
mod app;
mod config;
mod handler;
mod tui;
mod ui;

use api::ChatClient;
use app::App;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_or_init().unwrap_or_else(|_| Config::new());

    // Backend address - check env var first, then config, then default
    let server_url = std::env::var("MAILCHAT_SERVER")
        .ok()
        .or_else(|| config.server_url.clone())
        .unwrap_or_else(|| config::DEFAULT_SERVER_URL.to_string());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let app = App::new(ChatClient::new(&server_url));
    let result = run(&mut terminal, app).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, mut app: App) -> Result<()> {
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event).await?,
            None => break,
        }
    }

    // A request still in flight is dropped with the runtime; late replies
    // are ignored rather than delivered to a torn-down view.
    Ok(())
}
