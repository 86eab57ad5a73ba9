//! Control-plane parse, dispatch and collaborator errors.

use std::net::SocketAddr;

use atrium_config::ConfigError;

/// Failure reported by a user, room or cache collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The backing store could not be reached or refused the request.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The named resource does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Kind of resource, e.g. "cache".
        kind: &'static str,
        /// Requested name.
        name: String,
    },
}

/// Errors raised by the control-plane listener and its command handlers.
#[derive(Debug, thiserror::Error)]
pub enum MusError {
    /// The listener configuration is invalid.
    #[error("invalid control-plane configuration: {0}")]
    Config(#[from] ConfigError),

    /// The listener socket could not be created or bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Message shorter than an opcode.
    #[error("message too short ({0} chars)")]
    TooShort(usize),

    /// Opcode not in the command table.
    #[error("unknown opcode '{0}'")]
    UnknownOpcode(String),

    /// A required field is absent.
    #[error("{opcode}: missing field {index} ({name})")]
    MissingField {
        /// Command opcode.
        opcode: &'static str,
        /// Zero-based field index.
        index: usize,
        /// Field name.
        name: &'static str,
    },

    /// A field could not be parsed.
    #[error("{opcode}: invalid {name} '{value}'")]
    InvalidField {
        /// Command opcode.
        opcode: &'static str,
        /// Field name.
        name: &'static str,
        /// Raw value.
        value: String,
    },

    /// A collaborator failed.
    #[error(transparent)]
    Service(#[from] ServiceError),
}
