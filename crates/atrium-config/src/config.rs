//! Configuration structs with sensible defaults and RON persistence.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Game-facing listener settings.
    pub server: GameServerConfig,
    /// Control-plane (MUS) listener settings.
    pub mus: MusConfig,
    /// Logging settings.
    pub log: LogConfig,
    /// Static ban list served by the default ban lookup.
    pub bans: Vec<BanEntry>,
}

/// Game-facing listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameServerConfig {
    /// Interface to bind.
    pub bind_address: String,
    /// Port for client connections.
    pub port: u16,
    /// Maximum concurrent sessions. Slot ids run `1..=max_connections`.
    pub max_connections: u32,
    /// Worker threads in the I/O pool (0 = one per CPU).
    pub io_workers: usize,
    /// Listen backlog handed to the OS accept queue.
    pub backlog: u32,
    /// Grace period for in-flight sessions on shutdown, in milliseconds.
    pub shutdown_grace_ms: u64,
    /// Depth of each session's inbound frame queue.
    pub frame_queue: usize,
}

/// Control-plane listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MusConfig {
    /// Start the control-plane listener.
    pub enabled: bool,
    /// Interface to bind.
    pub bind_address: String,
    /// Port for control-plane connections.
    pub port: u16,
    /// The only source address allowed to connect.
    pub trusted_host: String,
    /// Largest message read from a single connection.
    pub max_message_bytes: usize,
    /// How long to wait for the message before giving up, in milliseconds.
    pub read_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive (e.g. "info", "debug,atrium_net=trace").
    pub level: String,
    /// Also write JSON records to `atrium.log` in `directory`.
    pub json_file: bool,
    /// Directory for the JSON log file.
    pub directory: Option<PathBuf>,
}

/// One statically banned address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BanEntry {
    /// Banned peer address.
    pub address: String,
    /// Reason shown to the peer in the ban notice.
    pub reason: String,
}

// --- Default implementations ---

impl Default for GameServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 30000,
            max_connections: 500,
            io_workers: 0,
            backlog: 128,
            shutdown_grace_ms: 3000,
            frame_queue: 64,
        }
    }
}

impl Default for MusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0".to_string(),
            port: 30001,
            trusted_host: "127.0.0.1".to_string(),
            max_message_bytes: 8192,
            read_timeout_ms: 5000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_file: false,
            directory: None,
        }
    }
}

// --- Typed accessors ---

fn parse_ip(field: &'static str, value: &str) -> Result<IpAddr, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

impl GameServerConfig {
    /// Socket address the game listener binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = parse_ip("server.bind_address", &self.bind_address)?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl MusConfig {
    /// Socket address the control-plane listener binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = parse_ip("mus.bind_address", &self.bind_address)?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// The trusted source address.
    pub fn trusted_ip(&self) -> Result<IpAddr, ConfigError> {
        parse_ip("mus.trusted_host", &self.trusted_host)
    }
}

impl BanEntry {
    /// The banned address, parsed.
    pub fn ip(&self) -> Result<IpAddr, ConfigError> {
        parse_ip("bans.address", &self.address)
    }
}

/// Default config directory: `<platform config dir>/atrium`, or `./config`
/// when the platform has none.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("atrium"))
        .unwrap_or_else(|| PathBuf::from("config"))
}

/// Path of the config file inside `config_dir`.
pub fn config_file(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE)
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl Config {
    /// Read `config.ron` from `config_dir`. On first run the directory and a
    /// default file are created instead.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_file(config_dir);
        if !path.exists() {
            let config = Self::default();
            config.save(config_dir)?;
            log::info!("wrote default server config to {}", path.display());
            return Ok(config);
        }
        let config = read_config(&path)?;
        log::info!("server config read from {}", path.display());
        Ok(config)
    }

    /// Write this config to `config_dir/config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let path = config_file(config_dir);
        let write_err = |source| ConfigError::Write {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(config_dir).map_err(write_err)?;

        let layout = ron::ser::PrettyConfig::new().depth_limit(3).struct_names(false);
        let text = ron::ser::to_string_pretty(self, layout).map_err(ConfigError::Encode)?;
        std::fs::write(&path, text).map_err(write_err)
    }

    /// Read the file again. `Some` carries the new config when anything
    /// differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = read_config(&config_file(config_dir))?;
        if fresh == *self {
            return Ok(None);
        }
        log::info!("server config changed on disk");
        Ok(Some(fresh))
    }
}
