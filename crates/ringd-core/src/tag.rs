//! Operation tags: the `user_data` word of every SQE and CQE.
//!
//! Layout (little end first):
//!
//! ```text
//!  63            40 39      32 31                       0
//! +----------------+----------+--------------------------+
//! |    reserved    |  opcode  |        descriptor        |
//! +----------------+----------+--------------------------+
//! ```
//!
//! The descriptor is a connection/file descriptor for most operations.
//! For `WriteFixed` it is the registered-pool slot index, which is how a
//! fixed write gives its buffer back when it completes.

/// Operation kinds. Values are stable; new kinds are appended.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Reserved. Nothing submits it today.
    Listen = 1,
    /// Multishot accept on the listening socket.
    Accept = 2,
    /// Multishot recvmsg on a connection, buffers from a buffer ring.
    RecvMsg = 3,
    Write = 4,
    /// Write from a registered pool slot. Descriptor field = slot index.
    WriteFixed = 5,
    Send = 6,
    Close = 7,
    Shutdown = 8,
}

impl OpCode {
    pub const ALL: [OpCode; 8] = [
        OpCode::Listen,
        OpCode::Accept,
        OpCode::RecvMsg,
        OpCode::Write,
        OpCode::WriteFixed,
        OpCode::Send,
        OpCode::Close,
        OpCode::Shutdown,
    ];

    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(OpCode::Listen),
            2 => Some(OpCode::Accept),
            3 => Some(OpCode::RecvMsg),
            4 => Some(OpCode::Write),
            5 => Some(OpCode::WriteFixed),
            6 => Some(OpCode::Send),
            7 => Some(OpCode::Close),
            8 => Some(OpCode::Shutdown),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::Listen => "listen",
            OpCode::Accept => "accept",
            OpCode::RecvMsg => "recvmsg",
            OpCode::Write => "write",
            OpCode::WriteFixed => "write_fixed",
            OpCode::Send => "send",
            OpCode::Close => "close",
            OpCode::Shutdown => "shutdown",
        }
    }
}

/// A packed `user_data` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct UserData(u64);

const OP_SHIFT: u32 = 32;
const DESC_MASK: u64 = 0xFFFF_FFFF;

impl UserData {
    #[inline]
    pub const fn encode(descriptor: u32, op: OpCode) -> Self {
        Self(descriptor as u64 | ((op as u8 as u64) << OP_SHIFT))
    }

    /// Inverse of [`encode`](Self::encode). The opcode is `None` when the
    /// byte does not name a known kind.
    #[inline]
    pub fn decode(self) -> (u32, Option<OpCode>) {
        (self.descriptor(), self.opcode())
    }

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn descriptor(self) -> u32 {
        (self.0 & DESC_MASK) as u32
    }

    #[inline]
    pub const fn opcode_raw(self) -> u8 {
        (self.0 >> OP_SHIFT) as u8
    }

    #[inline]
    pub fn opcode(self) -> Option<OpCode> {
        OpCode::from_u8(self.opcode_raw())
    }
}
