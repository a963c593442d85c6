//! # ringd-executor — The Event Loop
//!
//! One thread, one ring. `Runtime` waits for completions, routes each by
//! the opcode packed in its tag, moves buffers between the kernel and the
//! application, and submits the resulting operations in one batch per turn.
//!
//! - `runtime`   : the loop and its per-opcode handlers
//! - `handler`   : the `MessageHandler` seam and the built-in replies
//! - `connection`: descriptor → connection state
//! - `ring_log`  : access log lines formatted into registered slots
//! - `config`    : `RuntimeConfig` (defaults + `RINGD_*` env overrides)
//! - `stats`     : counters
//!
//! The runtime is fully generic over the `ringd-core` traits; the binary
//! plugs in `ringd-module`'s io_uring types.

pub mod config;
pub mod connection;
pub mod handler;
pub mod ring_log;
pub mod runtime;
pub mod stats;

#[cfg(test)]
pub(crate) mod fake;

pub use config::RuntimeConfig;
pub use handler::{MessageHandler, Reply, ReplyMode};
pub use runtime::Runtime;
pub use stats::RuntimeStats;
