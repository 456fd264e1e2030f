//! Arbiter CLI - runs one local match end to end.
//!
//! ```text
//! main() -> Game::new(seats) -> spawn(HighCard) -> rounds of input_all / input_any
//!                                    |
//!                                    v
//!                         GameExit::Concluded | Terminated
//! ```
//!
//! One seat is a human stand-in behind a [`ChannelTransport`]; a client task
//! answers its prompts the way a remote client would. The other seats are
//! synthetic and answer locally.

mod demo;

use anyhow::Result;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use arbiter_config::EngineConfig;
use arbiter_engine::{
    ChannelTransport, Game, GameExit, GameId, GameManager, GameServices, NetworkParticipant,
    Participant, TracingHooks, TracingStats, spawn,
};
use serde_json::json;

use demo::{HighCard, LoggingLobby, bot, run_client};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    // ~/.arbiter/logs/arbiter.log, next to the config file
    EngineConfig::path()
        .as_deref()
        .and_then(|path| path.parent())
        .map(|dir| dir.join("logs").join("arbiter.log"))
        .into_iter()
        .collect()
}

fn load_config() -> EngineConfig {
    match EngineConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(path = %e.path().display(), "Ignoring unreadable config: {e}");
            EngineConfig::default()
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let config = load_config();

    let (transport, client) = ChannelTransport::pair();
    let human: Arc<dyn Participant> = Arc::new(NetworkParticipant::new("you", transport));
    let seats = vec![human, bot("north"), bot("east"), bot("west")];

    let manager = Arc::new(
        GameManager::new(GameId::new(1), json!({ "rounds": 3 }))
            .with_consumed_items(vec!["deck".to_string()]),
    );
    let game = Game::new(manager, seats, config);
    let services = GameServices::default()
        .with_lobby(Arc::new(LoggingLobby))
        .with_hooks(Arc::new(TracingHooks))
        .with_stats(Arc::new(TracingStats));

    let client = tokio::spawn(run_client(client));
    let exit = spawn(Arc::clone(&game), HighCard::default(), services).await??;
    client.abort();

    match exit {
        GameExit::Concluded => println!(
            "Game {} concluded after {} sync tags",
            game.id(),
            game.sync_tags_issued()
        ),
        GameExit::Terminated => println!("Game {} was terminated", game.id()),
    }
    for snapshot in game.snapshots() {
        println!("  {}: {:?}", snapshot.account, snapshot.state);
    }

    Ok(())
}
