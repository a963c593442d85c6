//! Index free list for fixed-size slot pools.
//!
//! LIFO, singly linked through a pre-allocated `next` array, so `pop` and
//! `push` are O(1) and never allocate. Each slot also carries its owner,
//! which turns a double release into an error instead of a corrupted list.

use crate::error::{RingdError, Result};

const NIL: u16 = u16::MAX;

/// Largest slot count a free list can track (`u16::MAX` is the nil link).
pub const MAX_SLOTS: usize = NIL as usize;

/// Who currently owns a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOwner {
    /// On the free list.
    Free,
    /// Handed to the application, not yet submitted.
    App,
    /// Referenced by an in-flight kernel operation.
    Kernel,
}

pub struct FreeList {
    next: Box<[u16]>,
    owner: Box<[SlotOwner]>,
    head: u16,
    free: usize,
}

impl FreeList {
    /// All `n` slots start free. Pushed in index order, so the highest
    /// index is popped first.
    pub fn new(n: usize) -> Result<Self> {
        if n == 0 || n > MAX_SLOTS {
            return Err(RingdError::InvalidConfig(format!(
                "free list size {} not in 1..={}",
                n, MAX_SLOTS
            )));
        }
        let mut next = vec![NIL; n].into_boxed_slice();
        let mut head = NIL;
        for i in 0..n {
            next[i] = head;
            head = i as u16;
        }
        Ok(Self {
            next,
            owner: vec![SlotOwner::Free; n].into_boxed_slice(),
            head,
            free: n,
        })
    }

    /// Pop the head. `None` when every slot is outstanding.
    #[inline]
    pub fn pop(&mut self) -> Option<u16> {
        if self.head == NIL {
            return None;
        }
        let idx = self.head;
        self.head = self.next[idx as usize];
        self.next[idx as usize] = NIL;
        self.owner[idx as usize] = SlotOwner::App;
        self.free -= 1;
        Some(idx)
    }

    /// Record that an application-held slot now belongs to the kernel.
    #[inline]
    pub fn lend(&mut self, idx: u16) -> Result<()> {
        match self.owner.get(idx as usize) {
            Some(SlotOwner::App) => {
                self.owner[idx as usize] = SlotOwner::Kernel;
                Ok(())
            }
            _ => Err(RingdError::SlotNotOutstanding(idx)),
        }
    }

    /// Push an outstanding slot back on the list.
    #[inline]
    pub fn push(&mut self, idx: u16) -> Result<()> {
        match self.owner.get(idx as usize) {
            Some(SlotOwner::App) | Some(SlotOwner::Kernel) => {
                self.owner[idx as usize] = SlotOwner::Free;
                self.next[idx as usize] = self.head;
                self.head = idx;
                self.free += 1;
                Ok(())
            }
            _ => Err(RingdError::SlotNotOutstanding(idx)),
        }
    }

    #[inline]
    pub fn owner(&self, idx: u16) -> Option<SlotOwner> {
        self.owner.get(idx as usize).copied()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.next.len()
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.free
    }

    #[inline]
    pub fn outstanding(&self) -> usize {
        self.capacity() - self.free
    }
}
