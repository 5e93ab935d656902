//! Multicast liveness probing: one socket per check, bounded wait, no leaks.

use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::errors::ProbeError;

/// One datagram is enough to call a channel live; its contents are ignored.
const DRAIN_BUF_LEN: usize = 1024;

/// How concurrent sockets may share one multicast port, resolved once at
/// startup rather than per probe. macOS and the BSDs need `SO_REUSEPORT`
/// for simultaneous binds to the same port; elsewhere `SO_REUSEADDR` is
/// sufficient for multicast receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindSharing {
    ReuseAddress,
    ReusePort,
}

impl BindSharing {
    pub fn for_host() -> Self {
        if cfg!(any(
            target_os = "macos",
            target_os = "ios",
            target_os = "freebsd",
            target_os = "netbsd",
            target_os = "openbsd",
        )) {
            BindSharing::ReusePort
        } else {
            BindSharing::ReuseAddress
        }
    }

    fn apply(self, socket: &Socket) -> io::Result<()> {
        match self {
            BindSharing::ReuseAddress => socket.set_reuse_address(true),
            #[cfg(unix)]
            BindSharing::ReusePort => socket.set_reuse_port(true),
            #[cfg(not(unix))]
            BindSharing::ReusePort => socket.set_reuse_address(true),
        }
    }
}

/// Result of a single liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Live,
    Timeout,
}

/// Joins multicast groups and waits for traffic. Cheap to copy into each
/// worker task.
#[derive(Debug, Clone, Copy)]
pub struct Prober {
    iface: Ipv4Addr,
    sharing: BindSharing,
    timeout: Duration,
}

impl Prober {
    pub fn new(iface: Ipv4Addr, timeout: Duration) -> Self {
        Self {
            iface,
            sharing: BindSharing::for_host(),
            timeout,
        }
    }

    /// One liveness check against `group:port`.
    ///
    /// The socket exists only for the duration of the call; dropping it
    /// closes the descriptor and with it the group membership, on every
    /// exit path. No retries here, that is the caller's decision.
    pub async fn probe(&self, group: Ipv4Addr, port: u16) -> Result<ProbeOutcome, ProbeError> {
        if !group.is_multicast() {
            return Err(ProbeError::NotMulticast(group));
        }
        let socket = self.join(group, port)?;
        let socket = UdpSocket::from_std(socket.into()).map_err(ProbeError::Socket)?;

        let mut buf = [0u8; DRAIN_BUF_LEN];
        match timeout(self.timeout, socket.recv(&mut buf)).await {
            Ok(Ok(_)) => Ok(ProbeOutcome::Live),
            Ok(Err(e)) => Err(ProbeError::Socket(e)),
            Err(_) => Ok(ProbeOutcome::Timeout),
        }
    }

    // Binding to the group address keeps a concurrent probe for another
    // group on the same port from waking this one.
    fn join(&self, group: Ipv4Addr, port: u16) -> Result<Socket, ProbeError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        self.sharing.apply(&socket)?;
        socket.bind(&SocketAddrV4::new(group, port).into())?;
        socket.join_multicast_v4(&group, &self.iface)?;
        socket.set_nonblocking(true)?;
        Ok(socket)
    }
}
