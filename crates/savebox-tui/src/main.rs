//! Savebox TUI - a terminal client for a personal item list server.
//!
//! Sign in or register, then create, edit and delete items kept on the
//! server. A few command-line switches cover the same session without
//! opening the interface.

mod app;
mod ui;

use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use serde_json::json;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use savebox_core::{ApiClient, ApiError, Config, CredentialStore, SessionGate};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE_NAME: &str = "savebox.log";

const USAGE: &str = "\
Usage: savebox [COMMAND]

Without a command, starts the terminal interface.

Commands:
  --status          Show whether a session is stored
  --list            Print your items as JSON
  --show <id>       Print one item as JSON
  --login <email>   Sign in and store the session
  --logout          Forget the stored session
  --help            Show this message";

/// Log to stderr. Used by the command-line switches.
fn init_tracing_stderr() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Log to a file in the data directory, since the TUI owns the terminal.
/// The returned guard flushes the writer when dropped.
fn init_tracing_file(dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create data directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    Ok(guard)
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: could not read config, using defaults: {:#}", e);
            Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(command) = args.first() {
        init_tracing_stderr();
        let config = load_config();
        return run_command(config, command, &args[1..]).await;
    }

    let config = load_config();
    let _log_guard = match config.data_dir().and_then(|dir| init_tracing_file(&dir)) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: file logging disabled: {:#}", e);
            None
        }
    };
    info!("Savebox TUI starting");

    let mut app = App::new(config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Show the resolving splash while the stored session is read
    terminal.draw(|f| render(f, &app))?;
    app.start().await;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Savebox TUI shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks().await;

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

// ============================================================================
// Command-line switches
// ============================================================================

async fn run_command(mut config: Config, command: &str, rest: &[String]) -> Result<()> {
    let store = CredentialStore::from_config(&config)?;
    let mut gate = SessionGate::new(store);
    let api = ApiClient::new(config.api_base(), gate.token())?;
    gate.resolve().await;

    match command {
        "--status" => {
            let status = json!({
                "authenticated": gate.is_authenticated(),
                "api_base": api.base_url(),
                "credential_backend": config.credential_backend,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        "--list" => {
            require_session(&gate)?;
            let items = api
                .list_items()
                .await
                .map_err(|e| request_failed(e, "Failed to fetch items"))?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        "--show" => {
            let id: i64 = rest
                .first()
                .ok_or_else(|| anyhow!("--show needs an item id"))?
                .parse()
                .context("Item id must be a number")?;
            require_session(&gate)?;
            let item = api
                .get_item(id)
                .await
                .map_err(|e| request_failed(e, "Failed to fetch items"))?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        "--login" => {
            let email = rest
                .first()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| anyhow!("--login needs an email address"))?;
            let password = rpassword::prompt_password(format!("Password for {}: ", email))
                .context("Failed to read password")?;

            gate.login(&api, &email, &password)
                .await
                .map_err(|e| anyhow!(e.user_message("Failed to authenticate")))?;

            config.last_email = Some(email.clone());
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            eprintln!("Signed in as {}", email);
        }
        "--logout" => {
            gate.logout().await?;
            eprintln!("Signed out");
        }
        "--help" | "-h" => println!("{}", USAGE),
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }

    Ok(())
}

/// Error for a failed item request, pointing at `--login` when the server
/// no longer accepts the stored token
fn request_failed(error: ApiError, fallback: &str) -> anyhow::Error {
    let message = error.user_message(fallback);
    if error.is_unauthorized() {
        anyhow!("{}. Run `savebox --login <email>` to sign in again.", message)
    } else {
        anyhow!(message)
    }
}

fn require_session(gate: &SessionGate) -> Result<()> {
    if !gate.is_authenticated() {
        bail!("Not signed in. Run `savebox --login <email>` first.");
    }
    Ok(())
}
