//! Buffer ownership abstraction.
//!
//! Two kinds of buffers move between the application and the kernel:
//!
//! - **Registered pool slots** (`FixedBufPool`): pinned once with
//!   `IORING_REGISTER_BUFFERS`, referenced by index from
//!   `IORING_OP_WRITE_FIXED`. The application picks the slot.
//!
//! - **Provided ring buffers** (`ProvidedBufRing`): published through an
//!   `io_uring_buf_ring` under a buffer group id. The kernel picks the
//!   buffer and reports its id in the CQE flags.
//!
//! Both hand the application a move-only handle (`PoolSlot`, `RecvBuf`).
//! Giving a buffer back consumes the handle, so a buffer cannot be
//! returned twice or touched after it was returned.

use crate::error::{RingdError, Result};
use std::fmt;
use std::str::FromStr;

/// An application-held registered pool slot.
#[derive(Debug, PartialEq, Eq)]
pub struct PoolSlot {
    index: u16,
}

impl PoolSlot {
    /// Only `FixedBufPool` implementations mint slots.
    #[doc(hidden)]
    pub fn new(index: u16) -> Self {
        Self { index }
    }

    #[inline]
    pub fn index(&self) -> u16 {
        self.index
    }
}

/// A slot that now belongs to an in-flight fixed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LentSlot {
    pub index: u16,
    pub ptr: *const u8,
    pub len: u32,
}

/// A ring buffer the kernel filled and handed to the application.
#[derive(Debug, PartialEq, Eq)]
pub struct RecvBuf {
    bgid: u16,
    bid: u16,
    len: usize,
}

impl RecvBuf {
    /// Only `ProvidedBufRing` implementations mint handles.
    #[doc(hidden)]
    pub fn new(bgid: u16, bid: u16, len: usize) -> Self {
        Self { bgid, bid, len }
    }

    #[inline]
    pub fn bgid(&self) -> u16 {
        self.bgid
    }

    #[inline]
    pub fn bid(&self) -> u16 {
        self.bid
    }

    /// Bytes the kernel wrote.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Registered buffer pool with a free-list allocator.
///
/// **Contract:**
/// - `acquire()` never blocks; `None` means every slot is outstanding.
/// - A slot is either free, application-held (`PoolSlot`), or kernel-held
///   (after `lend`). `release(index)` is called exactly once per `lend`,
///   from the completion of the write that used it.
pub trait FixedBufPool {
    fn acquire(&mut self) -> Option<PoolSlot>;

    /// Writable bytes of an application-held slot.
    fn buf_mut(&mut self, slot: &PoolSlot) -> &mut [u8];

    /// Hand the first `len` bytes of the slot to the kernel.
    fn lend(&mut self, slot: PoolSlot, len: usize) -> Result<LentSlot>;

    /// Return an application-held slot that was never submitted.
    fn reclaim(&mut self, slot: PoolSlot);

    /// Return a kernel-held slot after its write completed.
    fn release(&mut self, index: u16) -> Result<()>;

    fn entry_size(&self) -> usize;

    fn capacity(&self) -> usize;

    fn available(&self) -> usize;
}

/// Kernel-shared ring of receive buffers for one buffer group.
///
/// **Contract:**
/// - Every buffer the kernel can see is not referenced by the application.
/// - `take()` is called once per buffer-select completion; the returned
///   handle is the only way to read the bytes.
/// - `recycle()` puts the buffer back at the tail and advances the ring.
pub trait ProvidedBufRing {
    fn bgid(&self) -> u16;

    fn entries(&self) -> usize;

    fn entry_size(&self) -> usize;

    /// The kernel selected `bid` and wrote `len` bytes into it.
    fn take(&mut self, bid: u16, len: usize) -> Result<RecvBuf>;

    fn data(&self, buf: &RecvBuf) -> &[u8];

    fn recycle(&mut self, buf: RecvBuf);

    /// Buffers the kernel may still select.
    fn kernel_visible(&self) -> usize;

    /// Buffers held by the application.
    fn held(&self) -> usize;
}

/// `{entries, entry_size, bgid}` for one buffer ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufRingParams {
    /// Ring capacity, power of two.
    pub entries: u16,
    pub entry_size: u32,
    pub bgid: u16,
}

/// The kernel caps a provided-buffer ring at 32768 entries.
pub const MAX_RING_ENTRIES: u16 = 1 << 15;

impl BufRingParams {
    pub const fn new(entries: u16, entry_size: u32, bgid: u16) -> Self {
        Self { entries, entry_size, bgid }
    }

    pub fn validate(&self) -> Result<()> {
        if self.entries == 0 || !self.entries.is_power_of_two() || self.entries > MAX_RING_ENTRIES {
            return Err(RingdError::InvalidConfig(format!(
                "buffer ring {}: entries {} must be a power of two in 1..={}",
                self.bgid, self.entries, MAX_RING_ENTRIES
            )));
        }
        if self.entry_size == 0 {
            return Err(RingdError::InvalidConfig(format!(
                "buffer ring {}: entry_size must be non-zero",
                self.bgid
            )));
        }
        Ok(())
    }
}

impl fmt::Display for BufRingParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.entries, self.entry_size, self.bgid)
    }
}

/// Parses `entries:entry_size:bgid`, e.g. `16:1024:0`.
impl FromStr for BufRingParams {
    type Err = RingdError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || RingdError::InvalidConfig(format!("buffer ring descriptor {:?}", s));
        let mut parts = s.trim().split(':');
        let entries = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let entry_size = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let bgid = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        if parts.next().is_some() {
            return Err(bad());
        }
        let params = Self { entries, entry_size, bgid };
        params.validate()?;
        Ok(params)
    }
}
