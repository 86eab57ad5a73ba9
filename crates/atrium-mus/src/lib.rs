//! Control plane ("MUS"): single-shot admin commands from one trusted host.
//!
//! A co-located management process connects, writes one message and goes
//! away. [`MusListener`] enforces the source address, [`MusCommand`] parses the
//! message, and [`CommandDispatcher`] applies it through the user, room and
//! cache collaborators.

pub mod command;
pub mod dispatch;
pub mod error;
pub mod listener;
pub mod services;

pub use command::{MusCommand, OPCODE_LEN, Opcode, ProfileSlice};
pub use dispatch::{CommandDispatcher, DEFAULT_CACHE, Outcome};
pub use error::{MusError, ServiceError};
pub use listener::MusListener;
pub use services::{CacheControl, NoCaches, NoRooms, RegistryUsers, RoomHandle, RoomManager, UserManager};
