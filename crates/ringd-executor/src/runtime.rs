//! `Runtime` — the single-threaded completion loop.
//!
//! ```text
//! loop {
//!     1. wait(1)            block until a completion exists (only suspension point)
//!     2. drain              move every ready CQE out of the ring
//!     3. for each CQE:      decode tag → match opcode
//!          Accept     → track connection, arm multishot recvmsg
//!          RecvMsg    → take ring buffer, validate envelope, handler,
//!                       queue reply, recycle buffer; an empty
//!                       payload is the peer's FIN → close
//!          WriteFixed → release pool slot named by the tag
//!          Close      → forget connection
//!          other      → acknowledge; unknown opcodes are counted
//!     4. flush              submit everything queued this turn as one batch
//! }
//! ```
//!
//! Generic over the backend, pool, ring and handler, so the same loop runs
//! on io_uring in the binary and on `FakeBackend`/`FakeRing` in tests.
//!
//! Faults split two ways: a broken ownership invariant (stale buffer id,
//! double slot release) or a failed submission ends `turn()` with an
//! error; a bad completion on one connection shuts that connection down
//! and nothing else.

use crate::config::RuntimeConfig;
use crate::connection::{ConnState, ConnTable, Peer};
use crate::handler::{MessageHandler, Reply};
use crate::ring_log;
use crate::stats::RuntimeStats;

use ringd_core::buffer::{FixedBufPool, ProvidedBufRing, RecvBuf};
use ringd_core::completion::Completion;
use ringd_core::error::{RingdError, Result};
use ringd_core::io_backend::IoBackend;
use ringd_core::submission::{Op, Submission};
use ringd_core::tag::{OpCode, UserData};
use ringd_module::net;

use io_uring::types::RecvMsgOut;
use std::ffi::c_void;
use std::fmt;
use std::os::fd::RawFd;
use std::time::SystemTime;
use tracing::{debug, info, warn, Level};

/// `struct io_uring_recvmsg_out`, ahead of the payload in every buffer.
const RECVMSG_HEADER: usize = 16;

/// How one receive completion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recv {
    Delivered,
    NoBuffers,
    Eof,
    Error(i32),
    Malformed(&'static str),
}

pub struct Runtime<B, P, R, H> {
    // Dropped first: the ring must release pool and buffer-ring memory
    // before that memory is freed.
    backend: B,
    pool: P,
    rings: Vec<R>,
    /// Index into `rings` of the connection buffer group.
    conn_ring: usize,
    handler: H,
    conns: ConnTable,
    /// Shared by every multishot recvmsg; no name, no control data.
    msghdr: Box<libc::msghdr>,
    listener: Option<RawFd>,
    access_log: bool,
    stats: RuntimeStats,
    cqes: Vec<Completion>,
}

impl<B, P, R, H> Runtime<B, P, R, H>
where
    B: IoBackend,
    P: FixedBufPool,
    R: ProvidedBufRing,
    H: MessageHandler,
{
    /// Assemble a runtime. Memory in `pool` and `rings` must already be
    /// registered with `backend`.
    pub fn new(backend: B, pool: P, rings: Vec<R>, handler: H, config: &RuntimeConfig) -> Result<Self> {
        let conn_ring = rings
            .iter()
            .position(|r| r.bgid() == config.conn_bgid)
            .ok_or(RingdError::UnknownBufferGroup(config.conn_bgid))?;
        if rings[conn_ring].entry_size() <= RECVMSG_HEADER {
            return Err(RingdError::InvalidConfig(format!(
                "connection buffers must exceed the {}-byte recvmsg header",
                RECVMSG_HEADER
            )));
        }

        // Safety: all-zero is a valid msghdr (null pointers, zero lengths).
        let msghdr: Box<libc::msghdr> = Box::new(unsafe { std::mem::zeroed() });

        Ok(Self {
            backend,
            pool,
            rings,
            conn_ring,
            handler,
            conns: ConnTable::new(),
            msghdr,
            listener: None,
            access_log: config.access_log,
            stats: RuntimeStats::default(),
            cqes: Vec::with_capacity(64),
        })
    }

    /// Arm multishot accept on a listening socket.
    pub fn listen(&mut self, fd: RawFd) -> Result<()> {
        self.listener = Some(fd);
        self.arm_accept(fd)?;
        self.backend.flush()?;
        info!(fd, "accepting connections");
        Ok(())
    }

    /// Drive the loop. Returns only on a fatal error.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.turn()?;
        }
    }

    /// One pass: wait, drain, dispatch, flush. Returns completions handled.
    pub fn turn(&mut self) -> Result<usize> {
        self.backend.wait(1)?;

        let mut cqes = std::mem::take(&mut self.cqes);
        let n = self.backend.drain(&mut cqes);
        let dispatched = cqes.drain(..).try_for_each(|c| self.dispatch(c));
        self.cqes = cqes;
        dispatched?;

        self.backend.flush()?;
        self.stats.turns += 1;
        self.stats.completions += n as u64;
        Ok(n)
    }

    /// Format a line into a pool slot and write it to stderr with
    /// `WRITE_FIXED`. The slot comes back when the write completes.
    ///
    /// Pool exhaustion drops the line and counts it.
    pub fn log_fixed(&mut self, level: Level, args: fmt::Arguments<'_>) -> Result<()> {
        write_log(&mut self.pool, &mut self.backend, &mut self.stats, level, args)
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    pub fn conns(&self) -> &ConnTable {
        &self.conns
    }

    pub fn listener(&self) -> Option<RawFd> {
        self.listener
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn ring(&self, bgid: u16) -> Option<&R> {
        self.rings.iter().find(|r| r.bgid() == bgid)
    }

    pub fn ring_mut(&mut self, bgid: u16) -> Option<&mut R> {
        self.rings.iter_mut().find(|r| r.bgid() == bgid)
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    // ── Dispatch ──

    fn dispatch(&mut self, c: Completion) -> Result<()> {
        let (desc, op) = c.user_data.decode();
        match op {
            Some(OpCode::Accept) => self.on_accept(desc as RawFd, c),
            Some(OpCode::RecvMsg) => self.on_recvmsg(desc as RawFd, c),
            Some(OpCode::WriteFixed) => self.on_write_fixed(desc, c),
            Some(OpCode::Close) => self.on_close(desc as RawFd, c),
            Some(op @ (OpCode::Send | OpCode::Write | OpCode::Listen | OpCode::Shutdown)) => {
                if c.result < 0 {
                    debug!(fd = desc, op = op.name(), errno = -c.result, "operation failed");
                }
                Ok(())
            }
            None => {
                self.stats.unknown_completions += 1;
                debug!(
                    user_data = c.user_data.raw(),
                    opcode = c.user_data.opcode_raw(),
                    "ignoring completion with unknown opcode"
                );
                Ok(())
            }
        }
    }

    fn on_accept(&mut self, lfd: RawFd, c: Completion) -> Result<()> {
        if c.result < 0 {
            self.stats.accept_errors += 1;
            warn!(fd = lfd, errno = -c.result, "accept failed");
        } else {
            let fd = c.result;
            let peer = net::peer_addr(fd);
            if !self.conns.insert(fd, peer) {
                warn!(fd, "descriptor reused while still tracked");
                self.conns.remove(fd);
                self.conns.insert(fd, peer);
            }
            self.stats.accepts += 1;
            info!(fd, peer = %Peer(peer), "accepted");
            self.arm_recv(fd)?;
            if self.access_log {
                self.log_fixed(Level::INFO, format_args!("accepted fd {} from {}", fd, Peer(peer)))?;
            }
        }
        if !c.has_more() {
            self.stats.accept_rearms += 1;
            debug!(fd = lfd, "re-arming multishot accept");
            self.arm_accept(lfd)?;
        }
        Ok(())
    }

    fn on_recvmsg(&mut self, fd: RawFd, c: Completion) -> Result<()> {
        let more = c.has_more();
        let entry_size = self.rings[self.conn_ring].entry_size();
        let buf = match c.buffer_id() {
            Some(bid) => Some(self.rings[self.conn_ring].take(bid, c.result.max(0) as usize)?),
            None => None,
        };

        let outcome = match (c.result, &buf) {
            (r, _) if r == -libc::ENOBUFS => Ok(Recv::NoBuffers),
            (0, _) => Ok(Recv::Eof),
            (r, _) if r < 0 => Ok(Recv::Error(-r)),
            (r, _) if r as usize > entry_size => Ok(Recv::Malformed("length exceeds buffer size")),
            (_, None) => Ok(Recv::Malformed("no buffer id")),
            (_, Some(b)) => self.deliver(fd, b),
        };
        // Recycled within the same dispatch, whatever happened.
        if let Some(b) = buf {
            self.rings[self.conn_ring].recycle(b);
        }

        match outcome? {
            Recv::Delivered => {}
            Recv::NoBuffers => {
                self.stats.recv_enobufs += 1;
                debug!(fd, "buffer ring empty, receive stopped");
            }
            Recv::Eof => {
                debug!(fd, "peer closed");
                return self.close_conn(fd);
            }
            Recv::Error(errno) => {
                debug!(fd, errno, "receive failed");
                if !more {
                    return self.close_conn(fd);
                }
                return Ok(());
            }
            Recv::Malformed(reason) => {
                self.stats.conn_faults += 1;
                warn!(fd, reason, "malformed receive, shutting connection down");
                return self.shutdown_conn(fd, more);
            }
        }

        if !more {
            self.rearm_or_close(fd)?;
        }
        Ok(())
    }

    /// Validate the envelope in `buf` and hand the payload to the handler.
    fn deliver(&mut self, fd: RawFd, buf: &RecvBuf) -> Result<Recv> {
        let ring = &self.rings[self.conn_ring];
        let out = match RecvMsgOut::parse(ring.data(buf), &self.msghdr) {
            Ok(out) => out,
            Err(()) => return Ok(Recv::Malformed("bad recvmsg envelope")),
        };
        if out.is_payload_truncated() {
            return Ok(Recv::Malformed("payload truncated"));
        }
        let payload = out.payload_data();
        // Multishot recvmsg reports the peer's FIN as a header-only message.
        if payload.is_empty() {
            return Ok(Recv::Eof);
        }

        let conn = match self.conns.get_mut(fd) {
            Some(conn) if conn.is_open() => conn,
            _ => {
                debug!(fd, len = payload.len(), "dropping data for closing connection");
                return Ok(Recv::Delivered);
            }
        };
        conn.messages += 1;
        conn.bytes += payload.len() as u64;
        let peer = conn.peer;
        self.stats.messages += 1;
        self.stats.bytes_in += payload.len() as u64;
        debug!(fd, bid = buf.bid(), len = payload.len(), "message");

        if self.access_log {
            write_log(
                &mut self.pool,
                &mut self.backend,
                &mut self.stats,
                Level::INFO,
                format_args!(
                    "fd {} peer {} bid {} len {}: {}",
                    fd,
                    Peer(peer),
                    buf.bid(),
                    payload.len(),
                    payload.escape_ascii()
                ),
            )?;
        }

        let reply = self.handler.on_message(fd, payload);
        queue_reply(&mut self.pool, &mut self.backend, &mut self.stats, fd, reply)?;
        Ok(Recv::Delivered)
    }

    fn on_write_fixed(&mut self, desc: u32, c: Completion) -> Result<()> {
        let index = u16::try_from(desc).map_err(|_| RingdError::SlotNotOutstanding(u16::MAX))?;
        if c.result < 0 {
            debug!(slot = index, errno = -c.result, "fixed write failed");
        }
        self.pool.release(index)
    }

    fn on_close(&mut self, fd: RawFd, c: Completion) -> Result<()> {
        if c.result < 0 {
            debug!(fd, errno = -c.result, "close failed");
        }
        let Some(conn) = self.conns.remove(fd) else {
            debug!(fd, "close for untracked descriptor");
            return Ok(());
        };
        self.stats.closes += 1;
        info!(fd, peer = %Peer(conn.peer), messages = conn.messages, bytes = conn.bytes, "closed");
        if self.access_log {
            self.log_fixed(
                Level::INFO,
                format_args!("closed fd {} from {} after {} messages", fd, Peer(conn.peer), conn.messages),
            )?;
        }
        Ok(())
    }

    // ── Submissions ──

    fn arm_accept(&mut self, fd: RawFd) -> Result<()> {
        self.backend.push(Submission::new(
            UserData::encode(fd as u32, OpCode::Accept),
            Op::AcceptMulti { fd },
        ))
    }

    fn arm_recv(&mut self, fd: RawFd) -> Result<()> {
        let bgid = self.rings[self.conn_ring].bgid();
        let msghdr = &*self.msghdr as *const libc::msghdr as *const c_void;
        self.backend.push(Submission::new(
            UserData::encode(fd as u32, OpCode::RecvMsg),
            Op::RecvMsgMulti { fd, msghdr, bgid },
        ))
    }

    /// The receive stream ended; restart it if the connection is healthy.
    fn rearm_or_close(&mut self, fd: RawFd) -> Result<()> {
        if self.conns.is_open(fd) {
            self.stats.recv_rearms += 1;
            debug!(fd, "re-arming multishot recvmsg");
            self.arm_recv(fd)
        } else {
            self.close_conn(fd)
        }
    }

    fn close_conn(&mut self, fd: RawFd) -> Result<()> {
        if !self.conns.advance(fd, ConnState::Closing) {
            return Ok(());
        }
        self.backend.push(Submission::new(
            UserData::encode(fd as u32, OpCode::Close),
            Op::Close { fd },
        ))
    }

    /// End the receive stream first when it is still armed; its final
    /// completion then closes the descriptor.
    fn shutdown_conn(&mut self, fd: RawFd, stream_armed: bool) -> Result<()> {
        if !stream_armed {
            return self.close_conn(fd);
        }
        if !self.conns.advance(fd, ConnState::ShuttingDown) {
            return Ok(());
        }
        self.backend.push(Submission::new(
            UserData::encode(fd as u32, OpCode::Shutdown),
            Op::Shutdown { fd },
        ))
    }
}

fn write_log<P: FixedBufPool, B: IoBackend>(
    pool: &mut P,
    backend: &mut B,
    stats: &mut RuntimeStats,
    level: Level,
    args: fmt::Arguments<'_>,
) -> Result<()> {
    let Some(slot) = pool.acquire() else {
        stats.log_dropped += 1;
        warn!("registered pool exhausted, log line dropped");
        return Ok(());
    };
    let len = ring_log::format_line(pool.buf_mut(&slot), slot.index(), level, SystemTime::now(), args);
    let lent = pool.lend(slot, len)?;
    backend.push(Submission::new(
        UserData::encode(lent.index as u32, OpCode::WriteFixed),
        Op::WriteFixed {
            fd: libc::STDERR_FILENO,
            buf: lent.ptr,
            len: lent.len,
            buf_index: lent.index,
        },
    ))?;
    stats.log_lines += 1;
    Ok(())
}

fn queue_reply<P: FixedBufPool, B: IoBackend>(
    pool: &mut P,
    backend: &mut B,
    stats: &mut RuntimeStats,
    fd: RawFd,
    reply: Reply<'_>,
) -> Result<()> {
    match reply {
        Reply::Nothing => return Ok(()),
        Reply::Static(bytes) => backend.push(Submission::new(
            UserData::encode(fd as u32, OpCode::Send),
            Op::Send { fd, buf: bytes.as_ptr(), len: bytes.len() as u32 },
        ))?,
        Reply::Copy(bytes) => {
            let Some(slot) = pool.acquire() else {
                stats.replies_dropped += 1;
                warn!(fd, len = bytes.len(), "registered pool exhausted, reply dropped");
                return Ok(());
            };
            let dst = pool.buf_mut(&slot);
            let n = bytes.len().min(dst.len());
            dst[..n].copy_from_slice(&bytes[..n]);
            if n < bytes.len() {
                stats.replies_truncated += 1;
                debug!(fd, len = bytes.len(), sent = n, "reply truncated to pool entry size");
            }
            let lent = pool.lend(slot, n)?;
            // Tagged with the slot so the completion can release it.
            backend.push(Submission::new(
                UserData::encode(lent.index as u32, OpCode::WriteFixed),
                Op::WriteFixed { fd, buf: lent.ptr, len: lent.len, buf_index: lent.index },
            ))?;
        }
    }
    stats.replies += 1;
    Ok(())
}
