//! Terminal console for shipquote that quotes deliveries and manages shipping services.

mod app;
mod input;
mod logger;
mod ui;

use std::{env, io, path::PathBuf, sync::Arc, time::Duration as StdDuration};

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use reqwest::Client;
use shipquote_core::{
    config::{ConfigHandle, JsonFileStore, Persistence},
    model::QuoteRequest,
    service::QuoteEngine,
    settings::EngineSettings,
};
use shipquote_provider_ors as ors;
use tracing::info;

use crate::app::{App, Screen};
use crate::input::Action;

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env file is fine
    dotenvy::dotenv().ok();

    let log_path = env::var("SHIPQUOTE_LOG_FILE")
        .map_or_else(|_| PathBuf::from(logger::DEFAULT_LOG_FILE), PathBuf::from);
    logger::init_file_logger(&log_path)?;

    let settings = EngineSettings::from_env()?;

    // HTTP + engine setup
    let client = Client::builder()
        .user_agent(settings.provider.user_agent.as_str())
        .build()?;
    let plugin = ors::plugin(client, &settings.provider);
    let store = Arc::new(JsonFileStore::new(settings.pricing_config_path.clone()));
    let config = ConfigHandle::load(store);
    let engine = Arc::new(QuoteEngine::new(&settings, &plugin, config));

    info!(
        store = %settings.store_name,
        provider = %plugin.meta.name,
        config = %settings.pricing_config_path.display(),
        "console started"
    );

    let app = App::new(engine);

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        app.refresh_status();
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for input (non-blocking, small timeout keeps the status line live)
        if event::poll(StdDuration::from_millis(250))?
            && let CEvent::Key(key) = event::read()?
        {
            let action = input::handle_key_event(key, &mut app);

            match action {
                Action::Quit => break,
                Action::None => {}
                Action::RequestQuote => {
                    if app.address_input.trim().is_empty() || app.area_input.trim().is_empty() {
                        app.error_message = Some("Enter both an address and an area".into());
                        continue;
                    }

                    app.is_loading = true;
                    app.clear_messages();
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    let request = QuoteRequest::new(app.address_input.trim(), app.area_input.trim());
                    let res = app.engine.handle_quote(&request).await;

                    app.is_loading = false;
                    match res {
                        Ok(response) => {
                            app.response = Some(response);
                            app.screen = Screen::QuoteView;
                        }
                        Err(err) => {
                            app.error_message = Some(format!("Quote failed: {err}"));
                        }
                    }
                }
                Action::ToggleService => {
                    let Some((code, enabled)) = app.current_toggle() else {
                        app.error_message = Some("No service selected".into());
                        continue;
                    };

                    app.clear_messages();
                    match app.engine.set_enabled(&code, enabled) {
                        Ok(outcome) => {
                            let state = if enabled { "enabled" } else { "disabled" };
                            match outcome.persistence {
                                Persistence::Saved => {
                                    app.info_message = Some(format!("{code} {state}"));
                                }
                                Persistence::InMemoryOnly => {
                                    app.info_message =
                                        Some(format!("{code} {state} (not persisted)"));
                                }
                                Persistence::Failed(reason) => {
                                    app.error_message =
                                        Some(format!("{code} {state}, but saving failed: {reason}"));
                                }
                            }
                        }
                        Err(err) => {
                            app.error_message = Some(format!("Update failed: {err}"));
                        }
                    }
                    app.refresh_services();
                }
            }
        }
    }

    Ok(())
}
