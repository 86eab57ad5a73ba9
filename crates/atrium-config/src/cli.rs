//! Command-line argument parsing for the Atrium server.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Atrium server command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "atrium", about = "Atrium virtual-world transport server")]
pub struct CliArgs {
    /// Game listener port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum concurrent client sessions.
    #[arg(long)]
    pub max_connections: Option<u32>,

    /// Control-plane (MUS) listener port.
    #[arg(long)]
    pub mus_port: Option<u16>,

    /// The only host allowed on the control plane.
    #[arg(long)]
    pub mus_host: Option<String>,

    /// I/O worker threads (0 = one per CPU).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(max) = args.max_connections {
            self.server.max_connections = max;
        }
        if let Some(port) = args.mus_port {
            self.mus.port = port;
        }
        if let Some(ref host) = args.mus_host {
            self.mus.trusted_host = host.clone();
        }
        if let Some(workers) = args.workers {
            self.server.io_workers = workers;
        }
        if let Some(ref level) = args.log_level {
            self.log.level = level.clone();
        }
    }
}
