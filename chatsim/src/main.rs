//! Chat simulator TUI application.
//!
//! A messaging-app style terminal interface for scripted workplace-safety
//! training conversations.
//!
//! # Headless Mode
//!
//! Run with `--headless` for a text-based interface suitable for automated testing:
//!
//! ```bash
//! cargo run -p chatsim -- --headless --mode evaluation --no-call
//! ```

mod app;
mod audio;
mod events;
mod headless;
mod ui;

use std::io::{self, stdout};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use chatsim_core::{Engine, EngineConfig, HeadlessSession, Script, SessionMode};

use app::App;
use audio::TerminalBell;
use events::{handle_event, EventResult};
use ui::render::render;

#[derive(Parser, Debug)]
#[command(name = "chatsim")]
#[command(about = "Scripted chat simulator for workplace-safety training", long_about = None)]
struct Cli {
    /// Scenario script (JSON). Defaults to the built-in DIAT scenario.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Engine configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for option shuffling and ambient notifications
    #[arg(long)]
    seed: Option<u64>,

    /// practice or evaluation
    #[arg(long)]
    mode: Option<SessionMode>,

    /// Disable the incoming call
    #[arg(long)]
    no_call: bool,

    /// Run in headless mode (text-only, no TUI)
    #[arg(long)]
    headless: bool,

    /// Print the transcript as JSON on exit (headless only)
    #[arg(long, requires = "headless")]
    json: bool,

    /// Directory for the TUI log file
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Keep the guard alive so buffered log lines reach the file
    let _guard = setup_logging(&cli)?;

    let config = load_config(&cli).await?;
    let script = load_script(&cli).await?;

    if cli.headless {
        let engine = Engine::with_script(config, script)?;
        return headless::run_headless(HeadlessSession::with_engine(engine), cli.json);
    }

    let engine = Engine::with_script(config, script)?.with_audio(Box::new(TerminalBell::default()));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, App::new(engine));

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        tracing::error!(error = %e, "TUI exited with an error");
    }
    result.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, mut app: App) -> io::Result<()> {
    loop {
        app.tick();
        terminal.draw(|f| render(f, &app))?;

        // Poll for events with timeout for animations
        if event::poll(Duration::from_millis(100))? {
            let ev = event::read()?;
            if handle_event(&mut app, ev) == EventResult::Quit {
                return Ok(());
            }
        }
    }
}

async fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("CHATSIM_CONFIG").map(PathBuf::from));

    let mut config = match path {
        Some(path) => EngineConfig::load(&path)
            .await
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }
    if let Some(mode) = cli.mode {
        config = config.with_mode(mode);
    }
    if cli.no_call {
        config = config.without_interrupt();
    }
    Ok(config)
}

async fn load_script(cli: &Cli) -> Result<Script> {
    let path = cli
        .script
        .clone()
        .or_else(|| std::env::var_os("CHATSIM_SCRIPT").map(PathBuf::from));

    match path {
        Some(path) => Script::load(&path)
            .await
            .with_context(|| format!("loading script {}", path.display())),
        None => Ok(Script::builtin()?),
    }
}

/// Headless mode logs to stderr; the TUI logs to a file so the screen stays clean.
fn setup_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if cli.headless {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
        return Ok(None);
    }

    let log_dir = cli
        .log_dir
        .clone()
        .or_else(|| std::env::var_os("CHATSIM_LOG_DIR").map(PathBuf::from))
        .unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(&log_dir, "chatsim.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    tracing::info!("Log file: {}", log_dir.join("chatsim.log").display());
    Ok(Some(guard))
}

fn default_log_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => Path::new(&home).join(".chatsim").join("logs"),
        None => PathBuf::from(".chatsim-logs"),
    }
}
