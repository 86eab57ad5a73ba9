//! Collaborators the command handlers act through.

use std::sync::Arc;

use atrium_net::{Session, SessionRegistry};
use atrium_wire::OutboundPacket;

use crate::command::ProfileSlice;
use crate::error::ServiceError;

/// Keyed access to online users.
pub trait UserManager: Send + Sync {
    /// Session of `user_id`, if online.
    fn session(&self, user_id: u32) -> Option<Arc<Session>>;

    /// Online users with rank of at least `min_rank`.
    fn sessions_with_min_rank(&self, min_rank: u8) -> Vec<Arc<Session>>;

    /// Reload `slice` of the user's cached profile from storage. Returns the
    /// packet that brings the client up to date, if one is needed.
    fn refresh_profile(&self, session: &Session, slice: ProfileSlice)
    -> Result<Option<OutboundPacket>, ServiceError>;
}

/// A loaded room.
pub trait RoomHandle: Send + Sync {
    /// Remove `user_id` from the room. Returns false if they were not in it.
    fn remove_user(&self, user_id: u32) -> bool;
}

/// Keyed access to loaded rooms.
pub trait RoomManager: Send + Sync {
    /// Room `room_id`, if loaded.
    fn room(&self, room_id: u32) -> Option<Arc<dyn RoomHandle>>;
}

/// Reloadable server-side caches.
pub trait CacheControl: Send + Sync {
    /// Rebuild the cache called `name`.
    fn rehash(&self, name: &str) -> Result<(), ServiceError>;
}

/// [`UserManager`] over the connection manager's session directory.
///
/// Has no profile store of its own, so refreshes are logged and send nothing.
pub struct RegistryUsers {
    registry: Arc<SessionRegistry>,
}

impl RegistryUsers {
    /// Wrap a session directory.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }
}

impl UserManager for RegistryUsers {
    fn session(&self, user_id: u32) -> Option<Arc<Session>> {
        self.registry.by_user(user_id)
    }

    fn sessions_with_min_rank(&self, min_rank: u8) -> Vec<Arc<Session>> {
        self.registry.with_min_rank(min_rank)
    }

    fn refresh_profile(
        &self,
        session: &Session,
        slice: ProfileSlice,
    ) -> Result<Option<OutboundPacket>, ServiceError> {
        tracing::debug!(slot = %session.slot(), %slice, "no profile store attached, nothing to reload");
        Ok(None)
    }
}

/// [`RoomManager`] with no rooms loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRooms;

impl RoomManager for NoRooms {
    fn room(&self, _room_id: u32) -> Option<Arc<dyn RoomHandle>> {
        None
    }
}

/// [`CacheControl`] that knows no caches.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCaches;

impl CacheControl for NoCaches {
    fn rehash(&self, name: &str) -> Result<(), ServiceError> {
        Err(ServiceError::NotFound {
            kind: "cache",
            name: name.to_string(),
        })
    }
}
