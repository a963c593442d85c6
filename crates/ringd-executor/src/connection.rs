//! Per-connection bookkeeping.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::os::fd::RawFd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Receive stream armed or about to be re-armed.
    Open,
    /// `Shutdown` submitted; waiting for the receive stream to end.
    ShuttingDown,
    /// `Close` submitted; waiting for its completion.
    Closing,
}

#[derive(Debug, Clone)]
pub struct Conn {
    pub peer: Option<SocketAddr>,
    pub state: ConnState,
    pub messages: u64,
    pub bytes: u64,
}

impl Conn {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.state == ConnState::Open
    }
}

/// Live connections keyed by descriptor.
#[derive(Debug, Default)]
pub struct ConnTable {
    conns: HashMap<RawFd, Conn>,
}

impl ConnTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `fd` is already tracked; the kernel never hands
    /// out a descriptor twice before it is closed.
    pub fn insert(&mut self, fd: RawFd, peer: Option<SocketAddr>) -> bool {
        if self.conns.contains_key(&fd) {
            return false;
        }
        self.conns.insert(
            fd,
            Conn {
                peer,
                state: ConnState::Open,
                messages: 0,
                bytes: 0,
            },
        );
        true
    }

    pub fn get(&self, fd: RawFd) -> Option<&Conn> {
        self.conns.get(&fd)
    }

    pub fn get_mut(&mut self, fd: RawFd) -> Option<&mut Conn> {
        self.conns.get_mut(&fd)
    }

    pub fn is_open(&self, fd: RawFd) -> bool {
        self.conns.get(&fd).is_some_and(Conn::is_open)
    }

    /// Move to `state` unless already there or past it. Returns whether
    /// the state changed.
    pub fn advance(&mut self, fd: RawFd, state: ConnState) -> bool {
        match self.conns.get_mut(&fd) {
            Some(conn) if rank(conn.state) < rank(state) => {
                conn.state = state;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, fd: RawFd) -> Option<Conn> {
        self.conns.remove(&fd)
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}

fn rank(state: ConnState) -> u8 {
    match state {
        ConnState::Open => 0,
        ConnState::ShuttingDown => 1,
        ConnState::Closing => 2,
    }
}

/// Displays a peer address or `-`.
pub struct Peer(pub Option<SocketAddr>);

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(addr) => write!(f, "{}", addr),
            None => f.write_str("-"),
        }
    }
}
