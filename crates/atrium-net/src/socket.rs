//! Listener and stream socket options.

use std::net::SocketAddr;
use std::time::Duration;

use socket2::{Domain, Protocol, SockRef, Socket, TcpKeepalive, Type};
use tokio::net::{TcpListener, TcpStream};

/// Socket options shared by both listeners.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Disable Nagle on accepted streams. Default: true.
    pub tcp_nodelay: bool,
    /// Enable TCP keepalive on accepted streams. Default: true.
    pub keepalive_enabled: bool,
    /// Idle time before the first probe. Default: 60s.
    pub keepalive_idle: Duration,
    /// Set `SO_REUSEADDR` on listeners. Default: true except on Windows.
    pub reuse_addr: bool,
    /// Pending-connection queue length passed to `listen`. Default: 128.
    pub backlog: i32,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            tcp_nodelay: true,
            keepalive_enabled: true,
            keepalive_idle: Duration::from_secs(60),
            reuse_addr: !cfg!(target_os = "windows"),
            backlog: 128,
        }
    }
}

impl SocketConfig {
    /// Defaults with the given accept backlog.
    pub fn with_backlog(backlog: u32) -> Self {
        Self {
            backlog: i32::try_from(backlog).unwrap_or(i32::MAX),
            ..Self::default()
        }
    }
}

/// Apply stream options to an accepted connection.
pub fn configure_stream(stream: &TcpStream, config: &SocketConfig) -> std::io::Result<()> {
    stream.set_nodelay(config.tcp_nodelay)?;
    if config.keepalive_enabled {
        let keepalive = TcpKeepalive::new().with_time(config.keepalive_idle);
        SockRef::from(stream).set_tcp_keepalive(&keepalive)?;
    }
    Ok(())
}

/// Create a non-blocking listener bound to `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn create_listener(addr: SocketAddr, config: &SocketConfig) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    if config.reuse_addr {
        socket.set_reuse_address(true)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(config.backlog)?;
    TcpListener::from_std(socket.into())
}
