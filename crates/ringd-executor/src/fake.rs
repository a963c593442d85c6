//! Kernel stand-ins for driving the runtime in tests.

use ringd_core::buffer::{ProvidedBufRing, RecvBuf};
use ringd_core::completion::Completion;
use ringd_core::error::{RingdError, Result};
use ringd_core::io_backend::IoBackend;
use ringd_core::ring_ledger::RingLedger;
use ringd_core::submission::Submission;
use ringd_core::tag::{OpCode, UserData};

use std::collections::VecDeque;
use std::os::fd::RawFd;

/// Records submissions; replays completions the test injects.
#[derive(Default)]
pub struct FakeBackend {
    pub submitted: Vec<Submission>,
    pub ready: VecDeque<Completion>,
    pub flushes: usize,
    pending: usize,
    /// Fail every push after this many, to exercise error paths.
    pub push_limit: Option<usize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete(&mut self, c: Completion) {
        self.ready.push_back(c);
    }

    pub fn take_submitted(&mut self) -> Vec<Submission> {
        std::mem::take(&mut self.submitted)
    }
}

impl IoBackend for FakeBackend {
    fn push(&mut self, sub: Submission) -> Result<()> {
        if self.push_limit.is_some_and(|n| self.submitted.len() >= n) {
            return Err(RingdError::RingFull);
        }
        self.submitted.push(sub);
        self.pending += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<usize> {
        let n = self.pending;
        self.pending = 0;
        self.flushes += 1;
        Ok(n)
    }

    fn wait(&mut self, _want: usize) -> Result<usize> {
        self.flush()?;
        Ok(self.ready.len())
    }

    fn drain(&mut self, out: &mut Vec<Completion>) -> usize {
        let n = self.ready.len();
        out.extend(self.ready.drain(..));
        n
    }

    fn pending(&self) -> usize {
        self.pending
    }
}

/// Size of `struct io_uring_recvmsg_out`.
pub const RECVMSG_OUT_LEN: usize = 16;

/// A provided-buffer ring without kernel memory.
///
/// The "kernel" side selects buffers FIFO, as the real ring does, and
/// writes a recvmsg envelope (no name, no control data) into them.
pub struct FakeRing {
    bgid: u16,
    entry_size: usize,
    bufs: Vec<Vec<u8>>,
    visible: VecDeque<u16>,
    ledger: RingLedger,
}

impl FakeRing {
    pub fn new(bgid: u16, entries: u16, entry_size: usize) -> Self {
        Self {
            bgid,
            entry_size,
            bufs: vec![vec![0; entry_size]; entries as usize],
            visible: (0..entries).collect(),
            ledger: RingLedger::new(bgid, entries as usize),
        }
    }

    /// Kernel receives `payload`: returns the `(bid, result)` a recvmsg
    /// completion would report, or `None` when the ring is empty.
    pub fn kernel_recv(&mut self, payload: &[u8], truncated: bool) -> Option<(u16, i32)> {
        let bid = self.visible.pop_front()?;
        let buf = &mut self.bufs[bid as usize];
        let room = self.entry_size - RECVMSG_OUT_LEN;
        let n = payload.len().min(room);
        let flags = if truncated || n < payload.len() { libc::MSG_TRUNC as u32 } else { 0 };
        buf[0..4].copy_from_slice(&0u32.to_ne_bytes());
        buf[4..8].copy_from_slice(&0u32.to_ne_bytes());
        buf[8..12].copy_from_slice(&(payload.len() as u32).to_ne_bytes());
        buf[12..16].copy_from_slice(&flags.to_ne_bytes());
        buf[RECVMSG_OUT_LEN..RECVMSG_OUT_LEN + n].copy_from_slice(&payload[..n]);
        Some((bid, (RECVMSG_OUT_LEN + n) as i32))
    }

    /// Recvmsg completion for `payload` on `fd`.
    pub fn recv_completion(&mut self, fd: RawFd, payload: &[u8], more: bool) -> Option<Completion> {
        let (bid, res) = self.kernel_recv(payload, false)?;
        Some(Completion::new(
            UserData::encode(fd as u32, OpCode::RecvMsg),
            res,
            Completion::buffer_flags(bid, more),
        ))
    }

    /// The peer's FIN as a multishot recvmsg reports it: a buffer holding
    /// only the envelope header, and no `F_MORE`.
    pub fn eof_completion(&mut self, fd: RawFd) -> Option<Completion> {
        self.recv_completion(fd, &[], false)
    }

    /// Kernel picks a buffer but the application gets garbage in it.
    pub fn kernel_fill_raw(&mut self, bytes: &[u8]) -> Option<u16> {
        let bid = self.visible.pop_front()?;
        self.bufs[bid as usize][..bytes.len()].copy_from_slice(bytes);
        Some(bid)
    }
}

impl ProvidedBufRing for FakeRing {
    fn bgid(&self) -> u16 {
        self.bgid
    }

    fn entries(&self) -> usize {
        self.bufs.len()
    }

    fn entry_size(&self) -> usize {
        self.entry_size
    }

    fn take(&mut self, bid: u16, len: usize) -> Result<RecvBuf> {
        self.ledger.take(bid)?;
        Ok(RecvBuf::new(self.bgid, bid, len.min(self.entry_size)))
    }

    fn data(&self, buf: &RecvBuf) -> &[u8] {
        &self.bufs[buf.bid() as usize][..buf.len()]
    }

    fn recycle(&mut self, buf: RecvBuf) {
        if self.ledger.give_back(buf.bid()) {
            self.visible.push_back(buf.bid());
        }
    }

    fn kernel_visible(&self) -> usize {
        self.ledger.kernel()
    }

    fn held(&self) -> usize {
        self.ledger.held()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_exhaustion_until_recycle() {
        let mut ring = FakeRing::new(0, 16, 1024);
        let mut held = Vec::new();
        for _ in 0..16 {
            let (bid, _) = ring.kernel_recv(b"x", false).unwrap();
            held.push(ring.take(bid, 17).unwrap());
        }
        assert!(ring.kernel_recv(b"x", false).is_none());
        assert_eq!(ring.kernel_visible() + ring.held(), 16);

        let first = held.remove(0);
        let bid = first.bid();
        ring.recycle(first);
        assert_eq!(ring.kernel_recv(b"y", false).map(|(b, _)| b), Some(bid));
    }

    #[test]
    fn test_eof_is_header_only_buffer_without_more() {
        let mut ring = FakeRing::new(0, 4, 64);
        let c = ring.eof_completion(7).unwrap();
        assert_eq!(c.result, RECVMSG_OUT_LEN as i32);
        assert!(c.buffer_id().is_some());
        assert!(!c.has_more());
        assert_eq!(c.user_data.decode(), (7, Some(OpCode::RecvMsg)));
    }
}
