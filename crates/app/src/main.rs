//! RateLimit - terminal client for the RateLimit multiplayer game
//!
//! Connects to an authoritative server, follows the shared frame stream and
//! lets the player act when it is their turn.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use ratelimit_core::{Settings, StateManager};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod error;
mod game;
mod game_loop;
mod identity;
mod report;
mod screen;
mod states;
mod terminal;

use error::Result;
use game::{Game, RuntimeConnector};
use states::Args;
use terminal::Terminal;

fn main() {
    let code = match run() {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "Client failed");
            eprintln!("ratelimit: {}", e);
            1
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let data_dir = identity::data_dir()?;
    init_logging(&data_dir.join("logs"));

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        os = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        "Starting RateLimit"
    );

    let settings = Settings::load(&identity::settings_path()?)?;
    let me = identity::node_id(&settings.server, &data_dir)?;
    tracing::info!(node = %me, "Identity loaded");

    // Transports run on the runtime; the game loop stays on this thread
    let runtime = tokio::runtime::Runtime::new()?;
    let connector = RuntimeConnector::new(runtime.handle().clone());
    let mut game = Game::new(settings, me, Box::new(connector), data_dir.join("reports"));

    let mut manager = StateManager::new(states::registry());
    manager.push(&mut game, states::JOIN_GAME, Args::None)?;

    let mut terminal = Terminal::new()?;
    let result = game_loop::run(&mut manager, &mut game, &mut terminal);
    drop(terminal);
    result
}

/// Log to `<dir>/ratelimit.log`; the terminal belongs to the game, so
/// without a log file nothing is logged
fn init_logging(dir: &Path) {
    let file = std::fs::create_dir_all(dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("ratelimit.log"))
    });
    let file = match file {
        Ok(file) => file,
        Err(e) => {
            eprintln!("ratelimit: logging disabled: {}", e);
            return;
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
