//! Message ids and packets the transport core emits on its own.
//!
//! Everything else the client receives is built by the application layer.

use crate::packet::{OutboundPacket, PacketBuilder};

/// Sent to a banned peer immediately before the connection is closed.
pub const BAN_NOTICE: u16 = 35;
/// Free-text moderator alert.
pub const MODERATOR_ALERT: u16 = 33;
/// Removes the client from its current room.
pub const ROOM_KICK: u16 = 18;
/// Free-text hotel alert.
pub const SYSTEM_ALERT: u16 = 139;

/// Ban notice carrying the reason text.
pub fn ban_notice(reason: &str) -> OutboundPacket {
    PacketBuilder::for_message(BAN_NOTICE)
        .append_raw(reason)
        .build()
}

/// Hotel alert shown as a dialog.
pub fn system_alert(message: &str) -> OutboundPacket {
    PacketBuilder::for_message(SYSTEM_ALERT)
        .append_raw(message)
        .build()
}

/// Moderator warning shown as a dialog.
pub fn moderator_alert(message: &str) -> OutboundPacket {
    PacketBuilder::for_message(MODERATOR_ALERT)
        .append_raw(message)
        .build()
}

/// Instructs the client to leave its room.
pub fn room_kick() -> OutboundPacket {
    PacketBuilder::for_message(ROOM_KICK).into_packet()
}
