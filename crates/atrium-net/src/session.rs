//! Per-connection session state.
//!
//! A [`Session`] moves `Accepted -> Active -> (Banned | Disconnected)`. Both
//! terminal states close the session: the reader stops, queued outbound
//! packets are flushed, and the socket is shut down.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use atrium_wire::OutboundPacket;
use tokio::sync::{mpsc, watch};

use crate::error::NetError;
use crate::slots::SlotId;

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Slot allocated, ban check pending.
    Accepted = 0,
    /// Frames are being dispatched.
    Active = 1,
    /// Closed after a ban.
    Banned = 2,
    /// Closed by either side or by a kick.
    Disconnected = 3,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Accepted,
            1 => Self::Active,
            2 => Self::Banned,
            _ => Self::Disconnected,
        }
    }

    /// Whether the session has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Banned | Self::Disconnected)
    }
}

/// Shared handle to one client connection.
///
/// Packet handlers, the control plane and the connection task all hold the
/// same `Arc<Session>`; every field is safe to touch from any of them.
#[derive(Debug)]
pub struct Session {
    slot: SlotId,
    peer: SocketAddr,
    state: AtomicU8,
    // 0 while not logged in.
    user_id: AtomicU32,
    rank: AtomicU8,
    outbound: mpsc::UnboundedSender<OutboundPacket>,
    closed: watch::Sender<bool>,
}

impl Session {
    /// Create a session in the `Accepted` state together with the receiving
    /// end of its outbound queue.
    pub fn new(slot: SlotId, peer: SocketAddr) -> (Self, mpsc::UnboundedReceiver<OutboundPacket>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        let session = Self {
            slot,
            peer,
            state: AtomicU8::new(SessionState::Accepted as u8),
            user_id: AtomicU32::new(0),
            rank: AtomicU8::new(0),
            outbound,
            closed,
        };
        (session, rx)
    }

    /// Slot this connection occupies.
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Remote address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Accepted -> Active`. No effect in any other state.
    pub fn activate(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Accepted as u8,
                SessionState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Logged-in user, if any.
    pub fn user_id(&self) -> Option<u32> {
        match self.user_id.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    /// Whether a user has logged in on this connection.
    pub fn is_logged_in(&self) -> bool {
        self.user_id().is_some()
    }

    /// Permission rank of the logged-in user.
    pub fn rank(&self) -> u8 {
        self.rank.load(Ordering::Acquire)
    }

    /// Update the cached rank.
    pub fn set_rank(&self, rank: u8) {
        self.rank.store(rank, Ordering::Release);
    }

    /// Record the authenticated identity. Prefer
    /// [`SessionRegistry::bind_user`](crate::SessionRegistry::bind_user),
    /// which also indexes the user id.
    pub(crate) fn login(&self, user_id: u32, rank: u8) {
        self.rank.store(rank, Ordering::Release);
        self.user_id.store(user_id, Ordering::Release);
    }

    /// Whether the session has been closed.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the session is closed.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Queue `packet` for this client.
    pub fn send(&self, packet: impl Into<OutboundPacket>) -> Result<(), NetError> {
        if self.is_closed() {
            return Err(NetError::SessionClosed(self.slot.get()));
        }
        self.outbound
            .send(packet.into())
            .map_err(|_| NetError::SessionClosed(self.slot.get()))
    }

    /// Mark the session banned and close it. Packets queued beforehand are
    /// still delivered.
    pub fn ban(&self) {
        self.finish(SessionState::Banned);
    }

    /// Close the session. Keeps `Banned` if already banned.
    pub fn disconnect(&self) {
        self.finish(SessionState::Disconnected);
    }

    fn finish(&self, terminal: SessionState) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                (!SessionState::from_u8(raw).is_terminal()).then_some(terminal as u8)
            });
        self.closed.send_if_modified(|closed| !std::mem::replace(closed, true));
    }
}
