//! Runtime configuration
//!
//! Compiled defaults with environment overrides.
//!
//! # Example
//!
//! ```rust,ignore
//! use ringd_executor::config::RuntimeConfig;
//!
//! // Defaults plus RINGD_* overrides
//! let config = RuntimeConfig::from_env()?;
//!
//! // Or customize programmatically
//! let config = RuntimeConfig::new()
//!     .port(8080)
//!     .reply(ReplyMode::Echo)
//!     .access_log(false);
//! config.validate()?;
//! ```

pub mod defaults;

use crate::handler::ReplyMode;
use ringd_core::buffer::BufRingParams;
use ringd_core::env::{env_get, env_get_bool, env_get_list, env_get_opt};
use ringd_core::error::{RingdError, Result};
use ringd_core::freelist::MAX_SLOTS;
use ringd_module::UringConfig;

use std::collections::HashSet;

/// Largest SQ the kernel accepts.
const MAX_SQ_ENTRIES: u32 = 32768;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub port: u16,
    pub backlog: i32,
    pub sq_entries: u32,
    pub sqpoll: bool,
    pub sqpoll_idle_ms: u32,
    pub sqpoll_cpu: Option<u32>,
    pub pool_entries: usize,
    pub pool_entry_size: usize,
    pub buf_rings: Vec<BufRingParams>,
    /// Buffer group used by connection receives.
    pub conn_bgid: u16,
    pub reply: ReplyMode,
    pub access_log: bool,
    /// tracing filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeConfig {
    /// Create config from compiled defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `RINGD_PORT` - Listening port
    /// - `RINGD_BACKLOG` - Listen backlog
    /// - `RINGD_SQ_ENTRIES` - Submission queue depth (power of two)
    /// - `RINGD_SQPOLL` - Enable kernel submission polling (0/1)
    /// - `RINGD_SQPOLL_IDLE_MS` - SQPOLL idle timeout
    /// - `RINGD_SQPOLL_CPU` - Pin the SQPOLL thread
    /// - `RINGD_POOL_ENTRIES` - Registered pool slots
    /// - `RINGD_POOL_ENTRY_SIZE` - Bytes per pool slot
    /// - `RINGD_BUF_RINGS` - `entries:entry_size:bgid,...`
    /// - `RINGD_CONN_BGID` - Buffer group for connection receives
    /// - `RINGD_REPLY` - `ack`, `echo` or `silent`
    /// - `RINGD_ACCESS_LOG` - Fixed-buffer access log to stderr (0/1)
    /// - `RINGD_LOG_LEVEL` - Log filter when `RUST_LOG` is unset
    ///
    /// Scalars that fail to parse keep their default; a malformed ring
    /// list is an error.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: env_get("RINGD_PORT", defaults::PORT),
            backlog: env_get("RINGD_BACKLOG", defaults::BACKLOG),
            sq_entries: env_get("RINGD_SQ_ENTRIES", defaults::SQ_ENTRIES),
            sqpoll: env_get_bool("RINGD_SQPOLL", defaults::SQPOLL),
            sqpoll_idle_ms: env_get("RINGD_SQPOLL_IDLE_MS", defaults::SQPOLL_IDLE_MS),
            sqpoll_cpu: env_get_opt("RINGD_SQPOLL_CPU"),
            pool_entries: env_get("RINGD_POOL_ENTRIES", defaults::POOL_ENTRIES),
            pool_entry_size: env_get("RINGD_POOL_ENTRY_SIZE", defaults::POOL_ENTRY_SIZE),
            buf_rings: env_get_list("RINGD_BUF_RINGS", defaults::BUF_RINGS.to_vec())?,
            conn_bgid: env_get("RINGD_CONN_BGID", defaults::CONN_BGID),
            reply: env_get("RINGD_REPLY", defaults::REPLY),
            access_log: env_get_bool("RINGD_ACCESS_LOG", defaults::ACCESS_LOG),
            log_level: env_get("RINGD_LOG_LEVEL", defaults::LOG_LEVEL.to_string()),
        })
    }

    /// Create config with explicit defaults (no env override).
    pub fn new() -> Self {
        Self {
            port: defaults::PORT,
            backlog: defaults::BACKLOG,
            sq_entries: defaults::SQ_ENTRIES,
            sqpoll: defaults::SQPOLL,
            sqpoll_idle_ms: defaults::SQPOLL_IDLE_MS,
            sqpoll_cpu: None,
            pool_entries: defaults::POOL_ENTRIES,
            pool_entry_size: defaults::POOL_ENTRY_SIZE,
            buf_rings: defaults::BUF_RINGS.to_vec(),
            conn_bgid: defaults::CONN_BGID,
            reply: defaults::REPLY,
            access_log: defaults::ACCESS_LOG,
            log_level: defaults::LOG_LEVEL.to_string(),
        }
    }

    // Builder methods

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn sq_entries(mut self, n: u32) -> Self {
        self.sq_entries = n;
        self
    }

    pub fn sqpoll(mut self, enable: bool) -> Self {
        self.sqpoll = enable;
        self
    }

    pub fn sqpoll_cpu(mut self, cpu: Option<u32>) -> Self {
        self.sqpoll_cpu = cpu;
        self
    }

    pub fn pool(mut self, entries: usize, entry_size: usize) -> Self {
        self.pool_entries = entries;
        self.pool_entry_size = entry_size;
        self
    }

    pub fn buf_rings(mut self, rings: Vec<BufRingParams>) -> Self {
        self.buf_rings = rings;
        self
    }

    pub fn conn_bgid(mut self, bgid: u16) -> Self {
        self.conn_bgid = bgid;
        self
    }

    pub fn reply(mut self, mode: ReplyMode) -> Self {
        self.reply = mode;
        self
    }

    pub fn access_log(mut self, enable: bool) -> Self {
        self.access_log = enable;
        self
    }

    /// Validate before any kernel resource is created.
    pub fn validate(&self) -> Result<()> {
        if self.sq_entries == 0
            || !self.sq_entries.is_power_of_two()
            || self.sq_entries > MAX_SQ_ENTRIES
        {
            return Err(RingdError::InvalidConfig(format!(
                "sq_entries {} must be a power of two in 1..={}",
                self.sq_entries, MAX_SQ_ENTRIES
            )));
        }
        if self.backlog <= 0 {
            return Err(RingdError::InvalidConfig("backlog must be > 0".into()));
        }
        if self.pool_entries == 0 || self.pool_entries > MAX_SLOTS {
            return Err(RingdError::InvalidConfig(format!(
                "pool_entries must be in 1..={}",
                MAX_SLOTS
            )));
        }
        if self.pool_entry_size == 0 {
            return Err(RingdError::InvalidConfig("pool_entry_size must be > 0".into()));
        }
        let mut seen = HashSet::new();
        for ring in &self.buf_rings {
            ring.validate()?;
            if !seen.insert(ring.bgid) {
                return Err(RingdError::InvalidConfig(format!(
                    "buffer group {} configured twice",
                    ring.bgid
                )));
            }
        }
        if !seen.contains(&self.conn_bgid) {
            return Err(RingdError::UnknownBufferGroup(self.conn_bgid));
        }
        Ok(())
    }

    pub fn uring_config(&self) -> UringConfig {
        UringConfig {
            sq_entries: self.sq_entries,
            cq_entries: None,
            sqpoll: self.sqpoll,
            sqpoll_idle_ms: self.sqpoll_idle_ms,
            sqpoll_cpu: self.sqpoll_cpu,
        }
    }

    /// Log the effective configuration.
    pub fn log(&self) {
        let rings: Vec<String> = self.buf_rings.iter().map(ToString::to_string).collect();
        tracing::info!(
            port = self.port,
            backlog = self.backlog,
            sq_entries = self.sq_entries,
            sqpoll = self.sqpoll,
            pool = %format_args!("{}x{}", self.pool_entries, self.pool_entry_size),
            buf_rings = %rings.join(","),
            conn_bgid = self.conn_bgid,
            reply = %self.reply,
            access_log = self.access_log,
            "configuration"
        );
    }
}
