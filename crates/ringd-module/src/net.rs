//! Listener setup (normal syscalls, startup only) and peer lookup.

use ringd_core::error::{RingdError, Result};

use nix::sys::socket::{
    bind, getpeername, listen, setsockopt, socket, sockopt, AddressFamily, Backlog, SockFlag,
    SockType, SockaddrIn, SockaddrStorage,
};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

fn sock_err(op: &'static str) -> impl FnOnce(nix::errno::Errno) -> RingdError {
    move |e| RingdError::Socket { op, errno: e as i32 }
}

/// TCP listener on `0.0.0.0:port` with `SO_REUSEADDR`.
///
/// Port 0 lets the kernel pick; see `local_port`.
pub fn listen_tcp(port: u16, backlog: i32) -> Result<OwnedFd> {
    let fd = socket(
        AddressFamily::Inet,
        SockType::Stream,
        SockFlag::SOCK_CLOEXEC,
        None,
    )
    .map_err(sock_err("socket"))?;
    setsockopt(&fd, sockopt::ReuseAddr, &true).map_err(sock_err("setsockopt"))?;

    let addr = SockaddrIn::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    bind(fd.as_raw_fd(), &addr).map_err(sock_err("bind"))?;

    let backlog = Backlog::new(backlog).map_err(sock_err("listen"))?;
    listen(&fd, backlog).map_err(sock_err("listen"))?;

    tracing::debug!(fd = fd.as_raw_fd(), port, "listening");
    Ok(fd)
}

/// Port a bound socket ended up on.
pub fn local_port(fd: RawFd) -> Result<u16> {
    let addr: SockaddrIn =
        nix::sys::socket::getsockname(fd).map_err(sock_err("getsockname"))?;
    Ok(addr.port())
}

/// Remote address of a connected socket, if it has one.
pub fn peer_addr(fd: RawFd) -> Option<SocketAddr> {
    let storage: SockaddrStorage = getpeername(fd).ok()?;
    if let Some(v4) = storage.as_sockaddr_in() {
        return Some(SocketAddr::V4(SocketAddrV4::from(*v4)));
    }
    storage
        .as_sockaddr_in6()
        .map(|v6| SocketAddr::V6(SocketAddrV6::from(*v6)))
}
