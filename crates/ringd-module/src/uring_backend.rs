//! `UringBackend` — the `IoBackend` over a real io_uring instance.
//!
//! Translates `Submission`s into SQEs, submits with `io_uring_enter()`
//! (or lets the SQPOLL thread pick them up), and drains CQEs into plain
//! `Completion`s. Also the only place that registers memory with the
//! kernel: the fixed-buffer pool and the provided-buffer rings.

use ringd_core::buffer::{FixedBufPool, ProvidedBufRing};
use ringd_core::completion::Completion;
use ringd_core::error::{RingdError, Result};
use ringd_core::io_backend::IoBackend;
use ringd_core::submission::{Op, Submission};
use ringd_core::tag::UserData;

use crate::buf_ring::BufRing;
use crate::regbuf_pool::RegisteredPool;

use io_uring::{opcode, squeue, types, IoUring};
use std::os::unix::io::{AsRawFd, RawFd};

/// Configuration for UringBackend.
#[derive(Debug, Clone)]
pub struct UringConfig {
    /// Number of SQ entries. Rounded up to a power of 2 by the kernel.
    pub sq_entries: u32,
    /// Number of CQ entries. Defaults to 2 * sq_entries.
    pub cq_entries: Option<u32>,
    /// Kernel-side submission polling.
    pub sqpoll: bool,
    /// SQPOLL thread idle time before it sleeps.
    pub sqpoll_idle_ms: u32,
    /// Pin the SQPOLL thread to this CPU.
    pub sqpoll_cpu: Option<u32>,
}

impl Default for UringConfig {
    fn default() -> Self {
        Self {
            sq_entries: 64,
            cq_entries: None,
            sqpoll: false,
            sqpoll_idle_ms: 5000,
            sqpoll_cpu: None,
        }
    }
}

fn errno_of(e: &std::io::Error) -> i32 {
    e.raw_os_error().unwrap_or(-1)
}

pub struct UringBackend {
    ring: IoUring,
    sqpoll: bool,
    pending_submit: usize,
}

impl UringBackend {
    pub fn new(config: &UringConfig) -> Result<Self> {
        let mut builder = IoUring::builder();
        if let Some(cq) = config.cq_entries {
            builder.setup_cqsize(cq);
        }
        if config.sqpoll {
            builder.setup_sqpoll(config.sqpoll_idle_ms);
            if let Some(cpu) = config.sqpoll_cpu {
                builder.setup_sqpoll_cpu(cpu);
            }
        }
        let ring = builder
            .build(config.sq_entries)
            .map_err(|e| RingdError::IoUringSetup(errno_of(&e)))?;

        tracing::debug!(
            sq_entries = ring.params().sq_entries(),
            cq_entries = ring.params().cq_entries(),
            sqpoll = config.sqpoll,
            "io_uring ready"
        );

        Ok(Self {
            ring,
            sqpoll: config.sqpoll,
            pending_submit: 0,
        })
    }

    pub fn fd(&self) -> RawFd {
        self.ring.as_raw_fd()
    }

    /// `IORING_REGISTER_BUFFERS` for every slot of `pool`.
    ///
    /// The pool must outlive this backend.
    pub fn register_buffers(&mut self, pool: &RegisteredPool) -> Result<()> {
        // Safety: the iovecs name the pool's heap region, which does not
        // move and is freed only when the pool drops.
        unsafe { self.ring.submitter().register_buffers(pool.iovecs()) }
            .map_err(|e| RingdError::RegisterBuffers(errno_of(&e)))?;
        tracing::debug!(
            slots = pool.iovecs().len(),
            entry_size = pool.entry_size(),
            "registered fixed buffers"
        );
        Ok(())
    }

    /// `IORING_REGISTER_PBUF_RING` for one buffer group.
    ///
    /// The ring must outlive this backend.
    pub fn register_buf_ring(&mut self, ring: &BufRing) -> Result<()> {
        let bgid = ring.bgid();
        let entries = ring.entries() as u16;
        // Safety: ring memory is page aligned, holds `entries` BufRingEntry
        // slots and stays allocated until the BufRing drops.
        unsafe {
            self.ring
                .submitter()
                .register_buf_ring_with_flags(ring.ring_addr(), entries, bgid, 0)
        }
        .map_err(|e| RingdError::RegisterBufRing { bgid, errno: errno_of(&e) })?;
        tracing::debug!(bgid, entries, "registered buffer ring");
        Ok(())
    }

    fn build_sqe(sub: &Submission) -> squeue::Entry {
        let sqe = match sub.op {
            Op::AcceptMulti { fd } => opcode::AcceptMulti::new(types::Fd(fd)).build(),
            Op::RecvMsgMulti { fd, msghdr, bgid } => {
                opcode::RecvMsgMulti::new(types::Fd(fd), msghdr as *const libc::msghdr, bgid)
                    .build()
            }
            Op::Send { fd, buf, len } => opcode::Send::new(types::Fd(fd), buf, len).build(),
            // -1 offset: sockets and pipes have no file position
            Op::Write { fd, buf, len } => opcode::Write::new(types::Fd(fd), buf, len)
                .offset(u64::MAX)
                .build(),
            Op::WriteFixed { fd, buf, len, buf_index } => {
                opcode::WriteFixed::new(types::Fd(fd), buf, len, buf_index)
                    .offset(u64::MAX)
                    .build()
            }
            Op::Shutdown { fd } => opcode::Shutdown::new(types::Fd(fd), libc::SHUT_RDWR).build(),
            Op::Close { fd } => opcode::Close::new(types::Fd(fd)).build(),
        };
        sqe.user_data(sub.user_data.raw())
    }

    fn try_push(&mut self, sqe: &squeue::Entry) -> bool {
        // Safety: every pointer in an Op names memory owned by the pool, a
        // ring or the runtime, all of which outlive the request.
        unsafe { self.ring.submission().push(sqe).is_ok() }
    }
}

impl IoBackend for UringBackend {
    fn push(&mut self, sub: Submission) -> Result<()> {
        let sqe = Self::build_sqe(&sub);
        if !self.try_push(&sqe) {
            // SQ full: hand the batch to the kernel and retry once.
            self.flush()?;
            if self.sqpoll {
                self.ring
                    .submitter()
                    .squeue_wait()
                    .map_err(|e| RingdError::IoUringSubmit(errno_of(&e)))?;
            }
            if !self.try_push(&sqe) {
                return Err(RingdError::RingFull);
            }
        }
        self.pending_submit += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<usize> {
        if self.pending_submit == 0 {
            return Ok(0);
        }
        let submitted = self
            .ring
            .submit()
            .map_err(|e| RingdError::IoUringSubmit(errno_of(&e)))?;
        self.pending_submit = 0;
        Ok(submitted)
    }

    fn wait(&mut self, want: usize) -> Result<usize> {
        match self.ring.submit_and_wait(want) {
            Ok(n) => {
                self.pending_submit = 0;
                Ok(n)
            }
            // A signal woke us; the caller drains whatever is there.
            Err(e) if e.raw_os_error() == Some(libc::EINTR) => Ok(0),
            Err(e) => Err(RingdError::IoUringSubmit(errno_of(&e))),
        }
    }

    fn drain(&mut self, out: &mut Vec<Completion>) -> usize {
        let before = out.len();
        out.extend(self.ring.completion().map(|cqe| {
            Completion::new(UserData::from_raw(cqe.user_data()), cqe.result(), cqe.flags())
        }));
        out.len() - before
    }

    fn pending(&self) -> usize {
        self.pending_submit
    }
}

// Note: no manual Drop. `io_uring::IoUring` closes the fd and unmaps the
// queues; that also drops the kernel's references to registered memory.

#[cfg(test)]
mod tests {
    use super::*;
    use ringd_core::tag::OpCode;

    #[test]
    fn test_sqe_carries_tag() {
        let ud = UserData::encode(42, OpCode::Send);
        let msg = b"OK\n";
        let sub = Submission::new(ud, Op::Send { fd: 42, buf: msg.as_ptr(), len: 3 });
        let sqe = UringBackend::build_sqe(&sub);
        assert_eq!(sqe.get_user_data(), ud.raw());
    }

    #[test]
    fn test_default_config() {
        let c = UringConfig::default();
        assert_eq!(c.sq_entries, 64);
        assert!(!c.sqpoll);
        assert_eq!(c.sqpoll_idle_ms, 5000);
    }
}
