//! Game-facing connection manager.
//!
//! Accepts client sockets, assigns each a bounded slot, checks the peer
//! against the ban list, and then runs three cooperating futures on one task
//! per connection: a reader that pushes decoded frames onto the session's
//! queue, a dispatcher that hands them to the [`PacketHandler`] one at a time,
//! and a writer that drains the session's outbound packets.

use std::any::Any;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use atrium_config::GameServerConfig;
use atrium_wire::{Frame, GameCodec, OutboundPacket, outgoing};
use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::error::NetError;
use crate::handler::{BanLookup, DispatchContext, PacketHandler};
use crate::registry::SessionRegistry;
use crate::session::Session;
use crate::shutdown::ShutdownSignal;
use crate::slots::{ConnectionStats, SlotId, SlotPool};
use crate::socket::{SocketConfig, configure_stream, create_listener};

struct Shared {
    slots: SlotPool,
    registry: Arc<SessionRegistry>,
    bans: Arc<dyn BanLookup>,
    handler: Arc<dyn PacketHandler>,
    socket: SocketConfig,
    frame_queue: usize,
}

/// Frees the slot and unregisters the session however the connection task
/// ends, including when it is aborted.
struct SlotGuard {
    shared: Arc<Shared>,
    slot: SlotId,
    peer: SocketAddr,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Some(session) = self.shared.registry.remove(self.slot) {
            session.disconnect();
        }
        self.shared.slots.free(self.slot);
        tracing::info!(slot = %self.slot, peer = %self.peer, "connection closed");
    }
}

/// Accepts game clients and owns their sessions.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    config: GameServerConfig,
    shutdown: ShutdownSignal,
}

impl ConnectionManager {
    /// Create a manager from the game listener configuration.
    pub fn new(config: &GameServerConfig, bans: Arc<dyn BanLookup>, handler: Arc<dyn PacketHandler>) -> Self {
        Self {
            shared: Arc::new(Shared {
                slots: SlotPool::new(config.max_connections),
                registry: Arc::new(SessionRegistry::new()),
                bans,
                handler,
                socket: SocketConfig::with_backlog(config.backlog),
                frame_queue: config.frame_queue.max(1),
            }),
            config: config.clone(),
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Directory of live sessions.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.shared.registry)
    }

    /// Current counters.
    pub fn stats(&self) -> ConnectionStats {
        self.shared.slots.stats()
    }

    /// Handle to this manager's stop signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Close the connection in `slot`. Returns false if no session is there.
    pub fn kick(&self, slot: SlotId) -> bool {
        match self.shared.registry.get(slot) {
            Some(session) => {
                tracing::info!(%slot, "kicking session");
                session.disconnect();
                true
            }
            None => false,
        }
    }

    /// Stop accepting, give open connections `grace` to finish, then force
    /// them closed. Repeated calls are ignored; returns whether this call
    /// started the stop.
    ///
    /// [`run`](Self::run) returns once the stop has completed.
    pub fn shutdown(&self, grace: Duration) -> bool {
        let fired = self.shutdown.trigger(grace);
        if fired {
            tracing::info!(grace_ms = grace.as_millis() as u64, "game listener stopping");
        }
        fired
    }

    /// Bind the configured address.
    pub fn bind(&self) -> Result<TcpListener, NetError> {
        let addr = self.config.socket_addr()?;
        create_listener(addr, &self.shared.socket).map_err(|source| NetError::Bind { addr, source })
    }

    /// Bind and serve until shut down.
    pub async fn run(&self) -> Result<(), NetError> {
        let listener = self.bind()?;
        self.run_with_listener(listener).await
    }

    /// Serve on a pre-bound listener until shut down.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), NetError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, capacity = self.shared.slots.capacity(), "game listener ready");
        }

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                _ = self.shutdown.triggered() => break,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(err) = joined
                        && err.is_panic()
                    {
                        tracing::error!(error = %err, "connection task panicked");
                    }
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            tracing::warn!(error = %err, "accept failed");
                            continue;
                        }
                    };
                    let Some(slot) = self.shared.slots.allocate() else {
                        tracing::warn!(%peer, "no free connection slot, rejecting");
                        continue;
                    };
                    if let Err(err) = configure_stream(&stream, &self.shared.socket) {
                        tracing::debug!(%peer, error = %err, "failed to apply socket options");
                    }
                    tracing::debug!(%slot, %peer, "accepted connection");
                    tasks.spawn(serve_connection(
                        Arc::clone(&self.shared),
                        self.shutdown.clone(),
                        stream,
                        peer,
                        slot,
                    ));
                }
            }
        }
        drop(listener);

        let grace = self.shutdown.grace().unwrap_or_default();
        let drained = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(remaining = tasks.len(), "grace period elapsed, forcing connections closed");
            tasks.shutdown().await;
        }
        tracing::info!("game listener stopped");
        Ok(())
    }
}

async fn serve_connection(
    shared: Arc<Shared>,
    shutdown: ShutdownSignal,
    stream: TcpStream,
    peer: SocketAddr,
    slot: SlotId,
) {
    let _guard = SlotGuard {
        shared: Arc::clone(&shared),
        slot,
        peer,
    };
    let (read_half, write_half) = stream.into_split();
    let mut writer = FramedWrite::new(write_half, GameCodec::new());

    if let Some(reason) = shared.bans.ban_reason(peer.ip()).filter(|r| !r.is_empty()) {
        tracing::info!(%slot, %peer, %reason, "rejecting banned peer");
        if let Err(err) = writer.send(outgoing::ban_notice(&reason)).await {
            tracing::debug!(%peer, error = %err, "failed to deliver ban notice");
        }
        let _ = writer.close().await;
        return;
    }

    let (session, outbound) = Session::new(slot, peer);
    let session = Arc::new(session);
    session.activate();
    shared.registry.insert(Arc::clone(&session));
    tracing::info!(%slot, %peer, "session active");

    let (queue_tx, queue_rx) = mpsc::channel(shared.frame_queue);
    tokio::join!(
        read_frames(FramedRead::new(read_half, GameCodec::new()), queue_tx, &session, &shutdown),
        dispatch_frames(queue_rx, &session, &shared),
        write_packets(writer, outbound, &session),
    );
}

async fn read_frames(
    mut frames: FramedRead<OwnedReadHalf, GameCodec>,
    queue: mpsc::Sender<Frame>,
    session: &Session,
    shutdown: &ShutdownSignal,
) {
    let slot = session.slot();
    loop {
        tokio::select! {
            _ = session.closed() => break,
            _ = shutdown.triggered() => {
                tracing::debug!(%slot, "draining session for shutdown");
                break;
            }
            next = frames.next() => match next {
                Some(Ok(frame)) => {
                    if queue.send(frame).await.is_err() {
                        break;
                    }
                }
                Some(Err(err)) => {
                    tracing::debug!(%slot, error = %err, "read failed");
                    break;
                }
                None => {
                    tracing::debug!(%slot, "peer closed connection");
                    break;
                }
            },
        }
    }
    let skipped = frames.decoder().skipped_bytes();
    if skipped > 0 {
        tracing::debug!(%slot, skipped, "bytes discarded as line noise");
    }
}

async fn dispatch_frames(mut queue: mpsc::Receiver<Frame>, session: &Arc<Session>, shared: &Shared) {
    let ctx = DispatchContext {
        session,
        registry: &shared.registry,
    };
    while let Some(frame) = queue.recv().await {
        if session.is_closed() {
            break;
        }
        let message_id = frame.message_id();
        match panic::catch_unwind(AssertUnwindSafe(|| shared.handler.handle(&ctx, frame))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(slot = %session.slot(), ?message_id, error = %err, "packet handler failed");
            }
            Err(payload) => {
                tracing::error!(
                    slot = %session.slot(),
                    ?message_id,
                    panic = panic_message(payload.as_ref()),
                    "packet handler panicked"
                );
            }
        }
    }
    session.disconnect();
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        *text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.as_str()
    } else {
        "non-string panic payload"
    }
}

async fn write_packets(
    mut sink: FramedWrite<OwnedWriteHalf, GameCodec>,
    mut outbound: mpsc::UnboundedReceiver<OutboundPacket>,
    session: &Session,
) {
    loop {
        tokio::select! {
            biased;
            packet = outbound.recv() => match packet {
                Some(packet) => {
                    if let Err(err) = sink.send(packet).await {
                        tracing::debug!(slot = %session.slot(), error = %err, "write failed");
                        session.disconnect();
                        return;
                    }
                }
                None => break,
            },
            _ = session.closed() => break,
        }
    }

    // Deliver whatever was queued before the close, e.g. a ban notice.
    while let Ok(packet) = outbound.try_recv() {
        if sink.feed(packet).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}
