use anyhow::{Context, Result, bail};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use mailpost::app::{App, AppEvent};
use mailpost::auth::{RingStorage, Secret};
use mailpost::config::{Config, DEFAULT_CONFIG_PATH, LoggingConfig};
use mailpost::service::HttpDispatchClient;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::filter::LevelFilter;

struct Args {
    config: PathBuf,
    debug: bool,
    store_secret: Option<String>,
    clear_secrets: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: PathBuf::from(DEFAULT_CONFIG_PATH),
        debug: false,
        store_secret: None,
        clear_secrets: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => match iter.next() {
                Some(path) => args.config = PathBuf::from(path),
                None => bail!("--config needs a path"),
            },
            "--debug" => args.debug = true,
            "--store-secret" => match iter.next() {
                Some(name) => args.store_secret = Some(name),
                None => bail!("--store-secret needs a name (smtp_password or api_key)"),
            },
            "--clear-secrets" => args.clear_secrets = true,
            other => bail!("Unknown argument: {}", other),
        }
    }
    Ok(args)
}

fn init_logging(config: &LoggingConfig, debug: bool) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .with_context(|| format!("Failed to open log file {}", config.file))?;

    let level = if debug {
        LevelFilter::DEBUG
    } else {
        config.level.parse().unwrap_or(LevelFilter::INFO)
    };

    // The terminal belongs to the TUI, so everything goes to the file
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

/// Fills in secrets that live in the keyring rather than the settings file.
fn resolve_secrets(config: &mut Config) {
    let store = RingStorage;
    if config.defaults.password_in_keyring {
        match store.get(Secret::SmtpPassword) {
            Ok(Some(password)) => config.defaults.smtp_password = password,
            Ok(None) => tracing::warn!("No SMTP password stored in the keyring"),
            Err(e) => tracing::warn!(error = %e, "Could not read SMTP password"),
        }
    }
    if config.service.api_key_in_keyring {
        match store.get(Secret::ApiKey) {
            Ok(Some(key)) => config.service.api_key = Some(key),
            Ok(None) => tracing::warn!("No API key stored in the keyring"),
            Err(e) => tracing::warn!(error = %e, "Could not read API key"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;

    // Secret management runs without the TUI
    if let Some(name) = &args.store_secret {
        let Some(secret) = Secret::from_name(name) else {
            bail!("Unknown secret '{}' (expected smtp_password or api_key)", name);
        };
        let mut value = String::new();
        io::stdin()
            .read_to_string(&mut value)
            .context("Failed to read secret from stdin")?;
        RingStorage.set(secret, value.trim_end_matches(['\r', '\n']))?;
        println!("Stored {} in the keyring.", secret.key());
        return Ok(());
    }
    if args.clear_secrets {
        for secret in Secret::ALL {
            RingStorage.clear(secret)?;
        }
        println!("Secrets cleared.");
        return Ok(());
    }

    let (mut config, load_error) = match Config::load(&args.config) {
        Ok(config) => (config, None),
        Err(e) => {
            eprintln!("Warning: {:#}; using default settings", e);
            (Config::default(), Some(e))
        }
    };
    init_logging(&config.logging, args.debug)?;
    if let Some(e) = load_error {
        tracing::warn!(path = %args.config.display(), error = %format!("{:#}", e), "Ignoring unreadable settings");
    }
    resolve_secrets(&mut config);
    tracing::info!(base_url = %config.service.base_url, "Starting mailpost");

    let client = HttpDispatchClient::new(
        &config.service.base_url,
        config.service.api_key.as_deref(),
        Duration::from_secs(config.service.timeout_secs),
        config.service.log_page_size,
    )?;

    let (tx, mut rx) = mpsc::channel::<AppEvent>(32);
    let mut app = App::new(
        config.defaults.clone(),
        config.keybindings.clone(),
        Arc::new(client),
        tx,
    );
    app.check_health();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut app, &mut rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<'_>,
    rx: &mut mpsc::Receiver<AppEvent>,
) -> Result<()> {
    let mut events = EventStream::new();

    while !app.should_quit() {
        terminal.draw(|f| mailpost::ui::render(f, &mut app.ui))?;

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    app.handle_key(key).await;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("Failed to read terminal event"),
                None => break,
            },
            Some(event) = rx.recv() => app.handle_event(event),
        }
    }

    tracing::info!("Exiting");
    Ok(())
}
