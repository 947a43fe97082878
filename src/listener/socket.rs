// src/listener/socket.rs
//! Shared socket creation and per-listener readiness registration.

use crate::error::InitError;
use mio::{Interest, Poll, Token};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};

/// Token of the shared socket in every listener's poll instance.
pub(crate) const SOCKET_TOKEN: Token = Token(0);

/// Creates the shared datagram socket and binds it to `addr`.
///
/// Address reuse and (on Unix) port reuse are enabled best-effort; failing to
/// set either is logged and otherwise ignored. The returned socket is
/// non-blocking, as readiness polling requires.
pub(crate) fn bind_shared(addr: SocketAddr) -> Result<UdpSocket, InitError> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(InitError::Socket)?;

    if let Err(e) = socket.set_reuse_address(true) {
        log::warn!("[UDP] failed to set SO_REUSEADDR on {}: {}, continuing", addr, e);
    }
    if let Err(e) = set_reuseport(&socket) {
        log::warn!("[UDP] failed to set SO_REUSEPORT on {}: {}, continuing", addr, e);
    }

    socket
        .bind(&addr.into())
        .map_err(|source| InitError::Bind { addr, source })?;
    socket.set_nonblocking(true).map_err(InitError::Socket)?;

    let socket: UdpSocket = socket.into();
    log::debug!(
        "[UDP] bound {}",
        socket
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| addr.to_string())
    );
    Ok(socket)
}

#[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
fn set_reuseport(socket: &Socket) -> io::Result<()> {
    socket.set_reuse_port(true)
}

#[cfg(not(all(unix, not(any(target_os = "solaris", target_os = "illumos")))))]
fn set_reuseport(_socket: &Socket) -> io::Result<()> {
    Ok(())
}

/// One listener's readiness registration: a poll instance and the handle to
/// the shared socket registered with it.
///
/// A slot is owned by exactly one listener thread while the engine runs and
/// handed back to the engine when that thread exits.
pub(crate) struct ListenerSlot {
    pub(crate) index: usize,
    pub(crate) poll: Poll,
    pub(crate) socket: mio::net::UdpSocket,
}

impl ListenerSlot {
    /// Registers a new handle to `shared` with a fresh poll instance.
    pub(crate) fn open(shared: &UdpSocket, index: usize) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut socket = mio::net::UdpSocket::from_std(shared.try_clone()?);
        poll.registry()
            .register(&mut socket, SOCKET_TOKEN, Interest::READABLE)?;
        Ok(Self {
            index,
            poll,
            socket,
        })
    }
}

impl std::fmt::Debug for ListenerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSlot")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
