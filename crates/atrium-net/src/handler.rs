//! Collaborator seams: ban lookup and packet dispatch.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use atrium_config::{BanEntry, ConfigError};
use atrium_wire::Frame;

use crate::registry::SessionRegistry;
use crate::session::Session;

/// Error type returned by packet handlers.
pub type DispatchError = Box<dyn std::error::Error + Send + Sync>;

/// Answers whether a peer address is banned.
pub trait BanLookup: Send + Sync {
    /// The ban reason for `ip`. `None` or an empty string means not banned.
    fn ban_reason(&self, ip: IpAddr) -> Option<String>;
}

impl<F> BanLookup for F
where
    F: Fn(IpAddr) -> Option<String> + Send + Sync,
{
    fn ban_reason(&self, ip: IpAddr) -> Option<String> {
        self(ip)
    }
}

/// Fixed ban list, usually loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticBanList {
    entries: HashMap<IpAddr, String>,
}

impl StaticBanList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configured entries. Fails on the first unparsable address.
    pub fn from_entries(entries: &[BanEntry]) -> Result<Self, ConfigError> {
        let mut list = Self::new();
        for entry in entries {
            list.insert(entry.ip()?, entry.reason.clone());
        }
        Ok(list)
    }

    /// Ban `ip` with `reason`.
    pub fn insert(&mut self, ip: IpAddr, reason: impl Into<String>) {
        self.entries.insert(ip, reason.into());
    }

    /// Number of banned addresses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is banned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BanLookup for StaticBanList {
    fn ban_reason(&self, ip: IpAddr) -> Option<String> {
        self.entries.get(&ip).cloned()
    }
}

/// What a packet handler gets to work with.
pub struct DispatchContext<'a> {
    /// The session the frame arrived on.
    pub session: &'a Arc<Session>,
    /// Every live session.
    pub registry: &'a SessionRegistry,
}

impl DispatchContext<'_> {
    /// Log `user_id` in on this session.
    pub fn login(&self, user_id: u32, rank: u8) -> bool {
        self.registry.bind_user(self.session.slot(), user_id, rank)
    }
}

/// Game-semantic handling of decoded frames.
///
/// Called once per frame, in arrival order, never concurrently for the same
/// session. Errors and panics are logged and the connection stays open.
pub trait PacketHandler: Send + Sync {
    /// Handle one frame.
    fn handle(&self, ctx: &DispatchContext<'_>, frame: Frame) -> Result<(), DispatchError>;
}

impl<F> PacketHandler for F
where
    F: Fn(&DispatchContext<'_>, Frame) -> Result<(), DispatchError> + Send + Sync,
{
    fn handle(&self, ctx: &DispatchContext<'_>, frame: Frame) -> Result<(), DispatchError> {
        self(ctx, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_ban_list_from_config() {
        let entries = vec![BanEntry {
            address: "10.1.2.3".into(),
            reason: "botting".into(),
        }];
        let list = StaticBanList::from_entries(&entries).unwrap();
        assert_eq!(list.ban_reason("10.1.2.3".parse().unwrap()).as_deref(), Some("botting"));
        assert!(list.ban_reason("10.1.2.4".parse().unwrap()).is_none());
    }

    #[test]
    fn test_bad_ban_address_is_rejected() {
        let entries = vec![BanEntry {
            address: "not-an-ip".into(),
            reason: String::new(),
        }];
        assert!(StaticBanList::from_entries(&entries).is_err());
    }

    #[test]
    fn test_closure_ban_lookup() {
        let lookup = |ip: IpAddr| ip.is_loopback().then(|| "local".to_string());
        assert_eq!(lookup.ban_reason("127.0.0.1".parse().unwrap()).as_deref(), Some("local"));
    }
}
