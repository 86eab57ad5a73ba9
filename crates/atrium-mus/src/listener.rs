//! Control-plane listener.
//!
//! Accepts one-shot connections from the trusted host. Each connection
//! carries exactly one command in a single payload; it is read, parsed,
//! dispatched and the socket closed whatever the outcome, without waiting for
//! the peer to close its side. Connections from any other address are
//! dropped before a single byte is read.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use atrium_config::MusConfig;
use atrium_net::{ShutdownSignal, SocketConfig, create_listener};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

use crate::command::MusCommand;
use crate::dispatch::CommandDispatcher;
use crate::error::MusError;

/// Listener for control-plane commands.
pub struct MusListener {
    bind_addr: SocketAddr,
    trusted: IpAddr,
    max_message_bytes: usize,
    read_timeout: Duration,
    dispatcher: Arc<CommandDispatcher>,
    shutdown: ShutdownSignal,
}

impl MusListener {
    /// Create a listener. Fails if the configured addresses do not parse.
    pub fn new(config: &MusConfig, dispatcher: CommandDispatcher) -> Result<Self, MusError> {
        Ok(Self {
            bind_addr: config.socket_addr()?,
            trusted: config.trusted_ip()?,
            max_message_bytes: config.max_message_bytes.max(1),
            read_timeout: Duration::from_millis(config.read_timeout_ms),
            dispatcher: Arc::new(dispatcher),
            shutdown: ShutdownSignal::new(),
        })
    }

    /// The only address allowed to connect.
    pub fn trusted_host(&self) -> IpAddr {
        self.trusted
    }

    /// Stop accepting and give in-flight commands `grace` to finish.
    /// Repeated calls are ignored; returns whether this call started the stop.
    pub fn shutdown(&self, grace: Duration) -> bool {
        let fired = self.shutdown.trigger(grace);
        if fired {
            tracing::info!(grace_ms = grace.as_millis() as u64, "control-plane listener stopping");
        }
        fired
    }

    /// Bind the configured address.
    pub fn bind(&self) -> Result<TcpListener, MusError> {
        create_listener(self.bind_addr, &SocketConfig::default()).map_err(|source| MusError::Bind {
            addr: self.bind_addr,
            source,
        })
    }

    /// Bind and serve until shut down.
    pub async fn run(&self) -> Result<(), MusError> {
        let listener = self.bind()?;
        self.run_with_listener(listener).await;
        Ok(())
    }

    /// Serve on a pre-bound listener until shut down.
    pub async fn run_with_listener(&self, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, trusted = %self.trusted, "control-plane listener ready");
        }

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                _ = self.shutdown.triggered() => break,
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            tracing::warn!(error = %err, "control-plane accept failed");
                            continue;
                        }
                    };
                    if peer.ip().to_canonical() != self.trusted {
                        tracing::warn!(%peer, "rejecting untrusted control-plane peer");
                        continue;
                    }
                    tasks.spawn(handle_connection(
                        stream,
                        peer,
                        self.max_message_bytes,
                        self.read_timeout,
                        Arc::clone(&self.dispatcher),
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
            tasks.shutdown().await;
        }
        tracing::info!("control-plane listener stopped");
    }
}

/// Read one message: whatever the first read delivers, up to `max` bytes.
///
/// Returns an empty buffer if the peer closes or stays silent for `timeout`.
async fn read_message(stream: &mut TcpStream, max: usize, timeout: Duration) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; max];
    let n = match tokio::time::timeout(timeout, stream.read(&mut buf)).await {
        Ok(read) => read?,
        Err(_) => 0,
    };
    buf.truncate(n);
    Ok(buf)
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    max: usize,
    timeout: Duration,
    dispatcher: Arc<CommandDispatcher>,
) {
    let bytes = match read_message(&mut stream, max, timeout).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(%peer, error = %err, "control-plane read failed");
            return;
        }
    };

    if bytes.is_empty() {
        tracing::debug!(%peer, "control-plane peer sent nothing");
        return;
    }

    match MusCommand::parse(&bytes).and_then(|cmd| {
        let outcome = dispatcher.dispatch(&cmd)?;
        Ok((cmd.opcode, outcome))
    }) {
        Ok((opcode, outcome)) => tracing::debug!(%peer, %opcode, ?outcome, "control-plane command handled"),
        Err(err) => tracing::error!(%peer, bytes = bytes.len(), error = %err, "control-plane command failed"),
    }
    // Dropping the stream closes the connection.
}
