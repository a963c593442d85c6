//! Ownership ledger for a provided-buffer ring.
//!
//! Every buffer id is either visible to the kernel (in the ring, or picked
//! for a completion that has not been reaped yet) or held by the
//! application. The ledger only moves ids between the two states; the ring
//! memory itself is managed by the `ProvidedBufRing` implementation.
//!
//! Invariant: `kernel() + held() == entries()`.

use crate::error::{RingdError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufState {
    Kernel,
    App,
}

pub struct RingLedger {
    bgid: u16,
    state: Box<[BufState]>,
    held: usize,
}

impl RingLedger {
    /// All `entries` ids start kernel-visible.
    pub fn new(bgid: u16, entries: usize) -> Self {
        Self {
            bgid,
            state: vec![BufState::Kernel; entries].into_boxed_slice(),
            held: 0,
        }
    }

    /// Kernel handed `bid` to the application through a completion.
    pub fn take(&mut self, bid: u16) -> Result<()> {
        match self.state.get(bid as usize) {
            Some(BufState::Kernel) => {
                self.state[bid as usize] = BufState::App;
                self.held += 1;
                Ok(())
            }
            _ => Err(RingdError::BufferNotInKernel { bgid: self.bgid, bid }),
        }
    }

    /// Application gives `bid` back to the kernel.
    ///
    /// Returns false if `bid` was not held; callers holding a `RecvBuf`
    /// cannot hit that case.
    pub fn give_back(&mut self, bid: u16) -> bool {
        match self.state.get(bid as usize) {
            Some(BufState::App) => {
                self.state[bid as usize] = BufState::Kernel;
                self.held -= 1;
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn state(&self, bid: u16) -> Option<BufState> {
        self.state.get(bid as usize).copied()
    }

    #[inline]
    pub fn entries(&self) -> usize {
        self.state.len()
    }

    #[inline]
    pub fn held(&self) -> usize {
        self.held
    }

    #[inline]
    pub fn kernel(&self) -> usize {
        self.state.len() - self.held
    }

    #[inline]
    pub fn bgid(&self) -> u16 {
        self.bgid
    }
}
