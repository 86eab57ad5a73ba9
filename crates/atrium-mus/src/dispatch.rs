//! Opcode handlers.

use std::sync::Arc;

use atrium_net::Session;
use atrium_wire::outgoing;

use crate::command::{MusCommand, Opcode, ProfileSlice};
use crate::error::MusError;
use crate::services::{CacheControl, RoomManager, UserManager};

/// Cache rehashed by a bare `HKRC`.
pub const DEFAULT_CACHE: &str = "catalogue";

/// What a command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Number of sessions the command reached. A session whose queue was
    /// already closed when the packet went out does not count.
    Applied(usize),
    /// The target user or room was not online or loaded.
    TargetOffline,
    /// The named cache was rebuilt.
    Rehashed(String),
}

/// Routes parsed commands to the user, room and cache collaborators.
pub struct CommandDispatcher {
    users: Arc<dyn UserManager>,
    rooms: Arc<dyn RoomManager>,
    caches: Arc<dyn CacheControl>,
}

impl CommandDispatcher {
    /// Create a dispatcher over the given collaborators.
    pub fn new(users: Arc<dyn UserManager>, rooms: Arc<dyn RoomManager>, caches: Arc<dyn CacheControl>) -> Self {
        Self { users, rooms, caches }
    }

    /// Execute `cmd`.
    pub fn dispatch(&self, cmd: &MusCommand) -> Result<Outcome, MusError> {
        let op = cmd.resolve()?;
        match op {
            Opcode::SystemAlert => {
                let user_id = cmd.number(op, 0, "user id")?;
                let message = cmd.text(op, 1, "message")?;
                Ok(self.with_user(op, user_id, |session| {
                    session.send(outgoing::system_alert(message)).is_ok()
                }))
            }
            Opcode::ModeratorAlert => {
                let user_id = cmd.number(op, 0, "user id")?;
                let message = cmd.text(op, 1, "message")?;
                Ok(self.with_user(op, user_id, |session| {
                    session.send(outgoing::moderator_alert(message)).is_ok()
                }))
            }
            Opcode::RoomKick => self.room_kick(op, cmd),
            Opcode::RankAlert => {
                let min_rank = cmd.number(op, 0, "minimum rank")?;
                let message = cmd.text(op, 1, "message")?;
                let packet = outgoing::system_alert(message);
                let delivered = self
                    .users
                    .sessions_with_min_rank(min_rank)
                    .iter()
                    .filter(|session| session.send(packet.clone()).is_ok())
                    .count();
                tracing::info!(opcode = %op, min_rank, delivered, "rank alert sent");
                Ok(Outcome::Applied(delivered))
            }
            Opcode::Ban => {
                let user_id = cmd.number(op, 0, "user id")?;
                let reason = cmd.text(op, 1, "reason")?;
                Ok(self.with_user(op, user_id, |session| {
                    let _ = session.send(outgoing::ban_notice(reason));
                    session.ban();
                    true
                }))
            }
            Opcode::Rehash => {
                let name = cmd.field(0).filter(|name| !name.is_empty()).unwrap_or(DEFAULT_CACHE);
                self.caches.rehash(name)?;
                tracing::info!(opcode = %op, cache = name, "cache rehashed");
                Ok(Outcome::Rehashed(name.to_string()))
            }
            Opcode::Refresh(slice) => self.refresh(op, slice, cmd),
        }
    }

    fn with_user(&self, op: Opcode, user_id: u32, action: impl FnOnce(&Session) -> bool) -> Outcome {
        match self.users.session(user_id) {
            Some(session) => {
                let applied = action(&session);
                tracing::info!(opcode = %op, user_id, slot = %session.slot(), applied, "command applied");
                Outcome::Applied(usize::from(applied))
            }
            None => {
                tracing::info!(opcode = %op, user_id, "target user offline, ignoring");
                Outcome::TargetOffline
            }
        }
    }

    fn room_kick(&self, op: Opcode, cmd: &MusCommand) -> Result<Outcome, MusError> {
        let room_id = cmd.number(op, 0, "room id")?;
        let user_id = cmd.number(op, 1, "user id")?;
        let message = cmd.field(2).filter(|m| !m.is_empty());

        let Some(room) = self.rooms.room(room_id) else {
            tracing::info!(opcode = %op, room_id, "room not loaded, ignoring");
            return Ok(Outcome::TargetOffline);
        };
        if !room.remove_user(user_id) {
            tracing::info!(opcode = %op, room_id, user_id, "user not in room, ignoring");
            return Ok(Outcome::TargetOffline);
        }

        Ok(self.with_user(op, user_id, |session| {
            let kicked = session.send(outgoing::room_kick()).is_ok();
            if let Some(message) = message {
                let _ = session.send(outgoing::moderator_alert(message));
            }
            kicked
        }))
    }

    fn refresh(&self, op: Opcode, slice: ProfileSlice, cmd: &MusCommand) -> Result<Outcome, MusError> {
        let user_id = cmd.number(op, 0, "user id")?;
        let Some(session) = self.users.session(user_id) else {
            tracing::info!(opcode = %op, user_id, "target user offline, ignoring");
            return Ok(Outcome::TargetOffline);
        };
        let update = self.users.refresh_profile(&session, slice)?;
        let needs_packet = update.is_some();
        let applied = match update {
            Some(packet) => session.send(packet).is_ok(),
            None => true,
        };
        tracing::info!(opcode = %op, user_id, %slice, needs_packet, applied, "profile slice reloaded");
        Ok(Outcome::Applied(usize::from(applied)))
    }
}
