//! Submission entries.
//!
//! One variant per operation the runtime issues. Pointers are raw because
//! the memory they name is owned by a pool, a ring or the runtime and must
//! stay put until the matching completion arrives; the backend only
//! copies them into an SQE.

use crate::tag::UserData;
use std::ffi::c_void;
use std::os::fd::RawFd;

/// What to submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Multishot accept: one SQE, one CQE per inbound connection.
    AcceptMulti { fd: RawFd },
    /// Multishot recvmsg with buffer selection from group `bgid`.
    ///
    /// `msghdr` points at a `libc::msghdr` that outlives the request.
    RecvMsgMulti { fd: RawFd, msghdr: *const c_void, bgid: u16 },
    Send { fd: RawFd, buf: *const u8, len: u32 },
    Write { fd: RawFd, buf: *const u8, len: u32 },
    /// Write from registered buffer `buf_index`; `buf` lies inside it.
    WriteFixed { fd: RawFd, buf: *const u8, len: u32, buf_index: u16 },
    /// `shutdown(fd, SHUT_RDWR)`
    Shutdown { fd: RawFd },
    Close { fd: RawFd },
}

/// An operation plus the tag echoed back in its completion(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub user_data: UserData,
    pub op: Op,
}

impl Submission {
    #[inline]
    pub fn new(user_data: UserData, op: Op) -> Self {
        Self { user_data, op }
    }
}
