//! Atrium server binary.
//!
//! Loads `config.ron` (creating it on first run), applies CLI overrides,
//! starts the game listener and the control-plane listener on a fixed-size
//! I/O pool, and shuts both down gracefully on Ctrl-C.

mod dispatcher;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use atrium_config::{CliArgs, Config, ConfigError, default_config_dir};
use atrium_mus::{CommandDispatcher, MusError, MusListener, NoCaches, NoRooms, RegistryUsers};
use atrium_net::{ConnectionManager, NetError, StaticBanList};
use clap::Parser;
use tracing::{error, info, warn};

use crate::dispatcher::TracingDispatcher;

#[derive(Debug, thiserror::Error)]
enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Net(#[from] NetError),
    #[error(transparent)]
    Mus(#[from] MusError),
    #[error("failed to build runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    let mut config = match Config::load_or_create(&config_dir) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config from {}: {err}", config_dir.display());
            return ExitCode::FAILURE;
        }
    };
    config.apply_cli_overrides(&args);
    atrium_log::init_from_config(&config);

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "server failed");
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> Result<(), ServerError> {
    let workers = match config.server.io_workers {
        0 => num_cpus::get(),
        n => n,
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .thread_name("atrium-io")
        .enable_all()
        .build()
        .map_err(ServerError::Runtime)?;
    info!(workers, "I/O pool started");
    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> Result<(), ServerError> {
    let bans = StaticBanList::from_entries(&config.bans)?;
    info!(banned = bans.len(), "ban list loaded");

    let manager = Arc::new(ConnectionManager::new(
        &config.server,
        Arc::new(bans),
        Arc::new(TracingDispatcher),
    ));
    let game_socket = manager.bind()?;

    let mus = if config.mus.enabled {
        let dispatcher = CommandDispatcher::new(
            Arc::new(RegistryUsers::new(manager.registry())),
            Arc::new(NoRooms),
            Arc::new(NoCaches),
        );
        let listener = Arc::new(MusListener::new(&config.mus, dispatcher)?);
        let socket = listener.bind()?;
        Some((listener, socket))
    } else {
        info!("control-plane listener disabled");
        None
    };

    let game_task = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.run_with_listener(game_socket).await })
    };
    let mus_task = mus.map(|(listener, socket)| {
        let server = Arc::clone(&listener);
        let task = tokio::spawn(async move { server.run_with_listener(socket).await });
        (listener, task)
    });

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for Ctrl-C, shutting down");
    }

    let grace = Duration::from_millis(config.server.shutdown_grace_ms);
    manager.shutdown(grace);
    if let Some((listener, _)) = &mus_task {
        listener.shutdown(grace);
    }

    match game_task.await {
        Ok(result) => result?,
        Err(err) => error!(error = %err, "game listener task failed"),
    }
    if let Some((_, task)) = mus_task
        && let Err(err) = task.await
    {
        error!(error = %err, "control-plane task failed");
    }

    let stats = manager.stats();
    info!(accepted = stats.accepted, active = stats.active, "server stopped");
    Ok(())
}
