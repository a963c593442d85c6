//! Compiled-in defaults. Every value can be overridden from the
//! environment (see `RuntimeConfig::from_env`).

use crate::handler::ReplyMode;
use ringd_core::buffer::BufRingParams;

pub const PORT: u16 = 3000;
pub const BACKLOG: i32 = 5;

pub const SQ_ENTRIES: u32 = 64;
pub const SQPOLL: bool = false;
pub const SQPOLL_IDLE_MS: u32 = 5000;

/// Registered pool: one slot per in-flight fixed write.
pub const POOL_ENTRIES: usize = 16;
pub const POOL_ENTRY_SIZE: usize = 256;

/// `16 x 1024 @ 0` serves connections; `16 x 512 @ 1` is a spare group.
pub const BUF_RINGS: [BufRingParams; 2] = [
    BufRingParams::new(16, 1024, 0),
    BufRingParams::new(16, 512, 1),
];
pub const CONN_BGID: u16 = 0;

/// Fixed `OK\n` for every message.
pub const REPLY: ReplyMode = ReplyMode::Ack;

pub const ACCESS_LOG: bool = true;
pub const LOG_LEVEL: &str = "info";
