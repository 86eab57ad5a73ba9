//! Errors raised by the game listener and its sessions.

use std::net::SocketAddr;

use atrium_config::ConfigError;

/// Errors raised by the connection layer.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The configured listen address is invalid.
    #[error("invalid listener configuration: {0}")]
    Config(#[from] ConfigError),

    /// The listener socket could not be created or bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The session's outbound queue is gone.
    #[error("session {0} is closed")]
    SessionClosed(u32),
}
