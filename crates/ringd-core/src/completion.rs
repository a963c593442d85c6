//! A backend-neutral view of one CQE.

use crate::tag::UserData;

/// `IORING_CQE_F_BUFFER`: upper 16 bits of `flags` hold a buffer id.
pub const CQE_F_BUFFER: u32 = 1 << 0;
/// `IORING_CQE_F_MORE`: the multishot request stays armed.
pub const CQE_F_MORE: u32 = 1 << 1;
/// `IORING_CQE_BUFFER_SHIFT`
pub const CQE_BUFFER_SHIFT: u32 = 16;

/// A completed operation as drained from the completion queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub user_data: UserData,
    /// Return value, or negative errno.
    pub result: i32,
    pub flags: u32,
}

impl Completion {
    #[inline]
    pub fn new(user_data: UserData, result: i32, flags: u32) -> Self {
        Self { user_data, result, flags }
    }

    /// Buffer id the kernel picked from a buffer ring, if any.
    #[inline]
    pub fn buffer_id(&self) -> Option<u16> {
        if self.flags & CQE_F_BUFFER != 0 {
            Some((self.flags >> CQE_BUFFER_SHIFT) as u16)
        } else {
            None
        }
    }

    /// False when a multishot request has terminated and must be re-armed.
    #[inline]
    pub fn has_more(&self) -> bool {
        self.flags & CQE_F_MORE != 0
    }

    /// Build the flags word for a buffer-select completion.
    #[inline]
    pub fn buffer_flags(bid: u16, more: bool) -> u32 {
        let mut flags = CQE_F_BUFFER | ((bid as u32) << CQE_BUFFER_SHIFT);
        if more {
            flags |= CQE_F_MORE;
        }
        flags
    }
}
