//! Runtime counters.

use std::fmt;

/// Monotonic counters, updated only by the loop thread.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStats {
    pub accepts: u64,
    pub accept_errors: u64,
    pub accept_rearms: u64,
    pub messages: u64,
    pub bytes_in: u64,
    pub recv_rearms: u64,
    /// Receive streams stopped because the buffer ring ran dry.
    pub recv_enobufs: u64,
    pub replies: u64,
    /// Copied replies lost to pool exhaustion.
    pub replies_dropped: u64,
    /// Copied replies cut at the pool entry size.
    pub replies_truncated: u64,
    pub log_lines: u64,
    /// Access log lines lost to pool exhaustion.
    pub log_dropped: u64,
    pub closes: u64,
    /// Connections shut down for a malformed completion.
    pub conn_faults: u64,
    pub unknown_completions: u64,
    pub completions: u64,
    pub turns: u64,
}

impl fmt::Display for RuntimeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "turns={} cqes={} accepts={} msgs={} bytes_in={} replies={} \
             replies_dropped={} log_dropped={} closes={} faults={} enobufs={} unknown={}",
            self.turns,
            self.completions,
            self.accepts,
            self.messages,
            self.bytes_in,
            self.replies,
            self.replies_dropped,
            self.log_dropped,
            self.closes,
            self.conn_faults,
            self.recv_enobufs,
            self.unknown_completions,
        )
    }
}
