//! Default packet handler for a server with no game logic attached.

use atrium_net::{DispatchContext, DispatchError, PacketHandler};
use atrium_wire::Frame;

/// Logs every frame and otherwise ignores it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDispatcher;

impl PacketHandler for TracingDispatcher {
    fn handle(&self, ctx: &DispatchContext<'_>, frame: Frame) -> Result<(), DispatchError> {
        tracing::debug!(
            slot = %ctx.session.slot(),
            tag = frame.tag,
            message_id = ?frame.message_id(),
            body_len = frame.body().len(),
            "frame received"
        );
        Ok(())
    }
}
