//! ringd error types.

use std::fmt;

#[derive(Debug)]
pub enum RingdError {
    /// io_uring setup failed.
    IoUringSetup(i32),
    /// io_uring submission failed.
    IoUringSubmit(i32),
    /// Submission queue full even after a flush.
    RingFull,
    /// `IORING_REGISTER_BUFFERS` rejected.
    RegisterBuffers(i32),
    /// `IORING_REGISTER_PBUF_RING` rejected.
    RegisterBufRing { bgid: u16, errno: i32 },
    /// Allocation of pool or ring memory failed.
    Alloc(&'static str),
    /// Configuration value out of range.
    InvalidConfig(String),
    /// Socket/bind/listen failure.
    Socket { op: &'static str, errno: i32 },
    /// No buffer ring registered for this group.
    UnknownBufferGroup(u16),
    /// Released a pool slot that was not handed out.
    SlotNotOutstanding(u16),
    /// Kernel reported a buffer id the ring does not consider selectable.
    BufferNotInKernel { bgid: u16, bid: u16 },
    /// OS error with errno.
    Os(i32),
}

impl RingdError {
    /// Setup faults end the process; everything else is a broken
    /// invariant or a transient condition.
    pub fn is_setup_fault(&self) -> bool {
        matches!(
            self,
            Self::IoUringSetup(_)
                | Self::RegisterBuffers(_)
                | Self::RegisterBufRing { .. }
                | Self::Alloc(_)
                | Self::InvalidConfig(_)
                | Self::Socket { .. }
                | Self::UnknownBufferGroup(_)
        )
    }

    /// errno of a kernel-originated failure.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::IoUringSetup(e)
            | Self::IoUringSubmit(e)
            | Self::RegisterBuffers(e)
            | Self::Os(e) => Some(*e),
            Self::RegisterBufRing { errno, .. } | Self::Socket { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}

impl fmt::Display for RingdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoUringSetup(e) => write!(f, "io_uring setup: errno {}", e),
            Self::IoUringSubmit(e) => write!(f, "io_uring submit: errno {}", e),
            Self::RingFull => write!(f, "submission queue full"),
            Self::RegisterBuffers(e) => write!(f, "register buffers: errno {}", e),
            Self::RegisterBufRing { bgid, errno } => {
                write!(f, "register buffer ring (bgid {}): errno {}", bgid, errno)
            }
            Self::Alloc(what) => write!(f, "allocation failed: {}", what),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            Self::Socket { op, errno } => write!(f, "{} failed: errno {}", op, errno),
            Self::UnknownBufferGroup(bgid) => write!(f, "no buffer ring for group {}", bgid),
            Self::SlotNotOutstanding(idx) => write!(f, "pool slot {} is not outstanding", idx),
            Self::BufferNotInKernel { bgid, bid } => {
                write!(f, "buffer {} of group {} is not kernel-owned", bid, bgid)
            }
            Self::Os(e) => write!(f, "OS error: errno {}", e),
        }
    }
}

impl std::error::Error for RingdError {}

impl From<std::io::Error> for RingdError {
    fn from(e: std::io::Error) -> Self {
        Self::Os(e.raw_os_error().unwrap_or(-1))
    }
}

pub type Result<T> = std::result::Result<T, RingdError>;
