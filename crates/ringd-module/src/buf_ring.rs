//! Provided-buffer ring using IORING_REGISTER_PBUF_RING.
//!
//! One page-aligned allocation holds the ring of `BufRingEntry`s followed
//! by the receive buffers. The kernel consumes entries from the head when
//! a buffer-select request needs one; the application appends returned
//! buffers at the tail and publishes the tail with a release store.

use ringd_core::buffer::{BufRingParams, ProvidedBufRing, RecvBuf};
use ringd_core::error::{RingdError, Result};
use ringd_core::ring_ledger::RingLedger;

use io_uring::types;
use std::alloc::Layout;
use std::sync::atomic::{AtomicU16, Ordering};

const PAGE_SIZE: usize = 4096;

pub struct BufRing {
    /// Layout: [BufRingEntry; entries] followed by buffer data.
    memory: *mut u8,
    layout: Layout,
    params: BufRingParams,
    /// Aliases the `resv` field of entry 0.
    tail: *const AtomicU16,
    local_tail: u16,
    mask: u16,
    ledger: RingLedger,
}

impl BufRing {
    /// Allocate and fill the ring. Every buffer starts kernel-visible.
    pub fn new(params: BufRingParams) -> Result<Self> {
        params.validate()?;
        let entries = params.entries as usize;
        let entry_size = params.entry_size as usize;

        let ring_size = entries * std::mem::size_of::<types::BufRingEntry>();
        let total = entries
            .checked_mul(entry_size)
            .and_then(|data| data.checked_add(ring_size))
            .ok_or(RingdError::Alloc("buffer ring size overflow"))?;
        let layout = Layout::from_size_align(total, PAGE_SIZE)
            .map_err(|_| RingdError::Alloc("buffer ring layout"))?;
        // Safety: total > 0, validate() rejects empty rings.
        let memory = unsafe { std::alloc::alloc_zeroed(layout) };
        if memory.is_null() {
            return Err(RingdError::Alloc("buffer ring"));
        }

        let tail = unsafe {
            types::BufRingEntry::tail(memory as *const types::BufRingEntry) as *const AtomicU16
        };

        let mut ring = Self {
            memory,
            layout,
            params,
            tail,
            local_tail: 0,
            mask: params.entries - 1,
            ledger: RingLedger::new(params.bgid, entries),
        };
        for bid in 0..params.entries {
            ring.add_buffer(bid);
        }
        ring.commit();
        Ok(ring)
    }

    /// Ring base address for registration.
    #[inline]
    pub fn ring_addr(&self) -> u64 {
        self.memory as u64
    }

    pub fn params(&self) -> BufRingParams {
        self.params
    }

    #[inline]
    fn buffer_base(&self) -> *mut u8 {
        let ring_size = self.params.entries as usize * std::mem::size_of::<types::BufRingEntry>();
        unsafe { self.memory.add(ring_size) }
    }

    #[inline]
    fn buffer_ptr(&self, bid: u16) -> *mut u8 {
        unsafe { self.buffer_base().add(bid as usize * self.params.entry_size as usize) }
    }

    /// Write `bid` into the next tail slot (does not publish).
    fn add_buffer(&mut self, bid: u16) {
        let idx = (self.local_tail & self.mask) as usize;
        let entry = unsafe { &mut *(self.memory as *mut types::BufRingEntry).add(idx) };
        entry.set_addr(self.buffer_ptr(bid) as u64);
        entry.set_len(self.params.entry_size);
        entry.set_bid(bid);
        self.local_tail = self.local_tail.wrapping_add(1);
    }

    /// Publish the local tail to the kernel.
    #[inline]
    fn commit(&self) {
        // Release: entry writes become visible before the new tail.
        unsafe {
            (*self.tail).store(self.local_tail, Ordering::Release);
        }
    }

    /// Tail as the kernel sees it.
    pub fn published_tail(&self) -> u16 {
        unsafe { (*self.tail).load(Ordering::Acquire) }
    }

    /// `(addr, len, bid)` of ring slot `idx & mask`.
    pub fn entry(&self, idx: u16) -> (u64, u32, u16) {
        let slot = (idx & self.mask) as usize;
        let entry = unsafe { &*(self.memory as *const types::BufRingEntry).add(slot) };
        (entry.addr(), entry.len(), entry.bid())
    }
}

impl ProvidedBufRing for BufRing {
    fn bgid(&self) -> u16 {
        self.params.bgid
    }

    fn entries(&self) -> usize {
        self.params.entries as usize
    }

    fn entry_size(&self) -> usize {
        self.params.entry_size as usize
    }

    fn take(&mut self, bid: u16, len: usize) -> Result<RecvBuf> {
        self.ledger.take(bid)?;
        Ok(RecvBuf::new(self.params.bgid, bid, len.min(self.entry_size())))
    }

    fn data(&self, buf: &RecvBuf) -> &[u8] {
        debug_assert_eq!(buf.bgid(), self.params.bgid);
        // Safety: the handle proves the application owns this buffer and
        // the kernel will not write it until it is recycled.
        unsafe { std::slice::from_raw_parts(self.buffer_ptr(buf.bid()), buf.len()) }
    }

    fn recycle(&mut self, buf: RecvBuf) {
        debug_assert_eq!(buf.bgid(), self.params.bgid);
        if self.ledger.give_back(buf.bid()) {
            self.add_buffer(buf.bid());
            self.commit();
        }
    }

    fn kernel_visible(&self) -> usize {
        self.ledger.kernel()
    }

    fn held(&self) -> usize {
        self.ledger.held()
    }
}

impl Drop for BufRing {
    fn drop(&mut self) {
        unsafe {
            std::alloc::dealloc(self.memory, self.layout);
        }
    }
}
