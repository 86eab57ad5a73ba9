//! Configuration system for the Atrium server.
//!
//! Settings persist to disk as a RON file, accept CLI overrides via clap, and
//! deserialize forward/backward compatibly (missing sections fall back to
//! defaults, unknown fields are ignored).

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{BanEntry, Config, GameServerConfig, LogConfig, MusConfig, config_file, default_config_dir};
pub use error::ConfigError;
