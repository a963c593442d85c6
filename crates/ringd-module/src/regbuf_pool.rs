//! `RegisteredPool` — `FixedBufPool` over one page-aligned region.
//!
//! `entries` slots of `entry_size` bytes, laid out back to back. One
//! `iovec` per slot is handed to `IORING_REGISTER_BUFFERS`, so the slot
//! index doubles as the registered buffer index of `WRITE_FIXED`.
//! Allocation is a LIFO free list: the most recently released slot is
//! reused first, which keeps the hot slots in cache.

use ringd_core::buffer::{FixedBufPool, LentSlot, PoolSlot};
use ringd_core::error::{RingdError, Result};
use ringd_core::freelist::{FreeList, SlotOwner};

use std::alloc::Layout;

const PAGE_SIZE: usize = 4096;

pub struct RegisteredPool {
    memory: *mut u8,
    layout: Layout,
    entry_size: usize,
    iovecs: Vec<libc::iovec>,
    free: FreeList,
}

impl RegisteredPool {
    pub fn new(entry_size: usize, entries: usize) -> Result<Self> {
        if entry_size == 0 {
            return Err(RingdError::InvalidConfig("pool entry_size must be non-zero".into()));
        }
        // Validates 1..=MAX_SLOTS before anything is allocated.
        let free = FreeList::new(entries)?;

        let total = entry_size
            .checked_mul(entries)
            .ok_or(RingdError::Alloc("registered pool size overflow"))?;
        let layout = Layout::from_size_align(total, PAGE_SIZE)
            .map_err(|_| RingdError::Alloc("registered pool layout"))?;
        // Safety: total > 0 since both factors are non-zero.
        let memory = unsafe { std::alloc::alloc_zeroed(layout) };
        if memory.is_null() {
            return Err(RingdError::Alloc("registered pool"));
        }

        let iovecs = (0..entries)
            .map(|i| libc::iovec {
                // Safety: i * entry_size < total
                iov_base: unsafe { memory.add(i * entry_size) } as *mut libc::c_void,
                iov_len: entry_size,
            })
            .collect();

        Ok(Self {
            memory,
            layout,
            entry_size,
            iovecs,
            free,
        })
    }

    /// One iovec per slot, in slot order, for registration.
    pub fn iovecs(&self) -> &[libc::iovec] {
        &self.iovecs
    }

    pub fn owner(&self, index: u16) -> Option<SlotOwner> {
        self.free.owner(index)
    }

    #[inline]
    fn slot_ptr(&self, index: u16) -> *mut u8 {
        self.iovecs[index as usize].iov_base as *mut u8
    }
}

impl FixedBufPool for RegisteredPool {
    fn acquire(&mut self) -> Option<PoolSlot> {
        self.free.pop().map(PoolSlot::new)
    }

    fn buf_mut(&mut self, slot: &PoolSlot) -> &mut [u8] {
        // Safety: the slot is application-held, so no in-flight write
        // reads it, and `&mut self` rules out a second live slice.
        unsafe { std::slice::from_raw_parts_mut(self.slot_ptr(slot.index()), self.entry_size) }
    }

    fn lend(&mut self, slot: PoolSlot, len: usize) -> Result<LentSlot> {
        let index = slot.index();
        self.free.lend(index)?;
        Ok(LentSlot {
            index,
            ptr: self.slot_ptr(index),
            len: len.min(self.entry_size) as u32,
        })
    }

    fn reclaim(&mut self, slot: PoolSlot) {
        let pushed = self.free.push(slot.index());
        debug_assert!(pushed.is_ok(), "reclaimed slot {} was not held", slot.index());
    }

    fn release(&mut self, index: u16) -> Result<()> {
        // Only a slot lent to the kernel can come back through a completion.
        match self.free.owner(index) {
            Some(SlotOwner::Kernel) => self.free.push(index),
            _ => Err(RingdError::SlotNotOutstanding(index)),
        }
    }

    fn entry_size(&self) -> usize {
        self.entry_size
    }

    fn capacity(&self) -> usize {
        self.free.capacity()
    }

    fn available(&self) -> usize {
        self.free.available()
    }
}

impl Drop for RegisteredPool {
    fn drop(&mut self) {
        unsafe {
            std::alloc::dealloc(self.memory, self.layout);
        }
    }
}
