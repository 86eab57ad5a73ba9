//! Game-facing transport: listener sockets, bounded session slots, the
//! session directory, and the connection manager that ties the frame codec to
//! an external packet handler.

pub mod error;
pub mod handler;
pub mod manager;
pub mod registry;
pub mod session;
pub mod shutdown;
pub mod slots;
pub mod socket;

pub use error::NetError;
pub use handler::{BanLookup, DispatchContext, DispatchError, PacketHandler, StaticBanList};
pub use manager::ConnectionManager;
pub use registry::SessionRegistry;
pub use session::{Session, SessionState};
pub use shutdown::ShutdownSignal;
pub use slots::{ConnectionStats, SlotId, SlotPool};
pub use socket::{SocketConfig, configure_stream, create_listener};
