//! ringd-echo — single-threaded io_uring message server.
//!
//! Multishot accept, multishot recvmsg from a provided-buffer ring, and
//! replies via `SEND` (static ack) or `WRITE_FIXED` (echo, access log).
//!
//! Usage:
//!   ringd-echo [port]
//!
//! Environment (all optional):
//!   RINGD_PORT=3000             listening port (overridden by [port])
//!   RINGD_REPLY=ack             ack | echo | silent
//!   RINGD_BUF_RINGS=16:1024:0,16:512:1
//!   RINGD_POOL_ENTRIES=16 RINGD_POOL_ENTRY_SIZE=256
//!   RINGD_SQPOLL=0 RINGD_SQPOLL_IDLE_MS=5000 RINGD_SQPOLL_CPU=
//!   RINGD_ACCESS_LOG=1          fixed-buffer access log on stderr
//!   RINGD_LOG_LEVEL=info        tracing filter when RUST_LOG is unset
//!
//! Test:
//!   printf 'hello' | nc -q1 127.0.0.1 3000

mod logging;

use ringd_core::error::Result;
use ringd_executor::{Runtime, RuntimeConfig};
use ringd_module::{net, BufRing, RegisteredPool, UringBackend};

use std::os::fd::AsRawFd;
use tracing::{error, info, Level};

fn main() {
    let mut config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ringd-echo: {}", e);
            std::process::exit(2);
        }
    };
    if let Some(arg) = std::env::args().nth(1) {
        match arg.parse() {
            Ok(port) => config.port = port,
            Err(_) => {
                eprintln!("usage: ringd-echo [port]");
                std::process::exit(2);
            }
        }
    }

    logging::init(&config.log_level);
    config.log();

    if let Err(e) = serve(&config) {
        error!(error = %e, setup = e.is_setup_fault(), "ringd-echo exiting");
        std::process::exit(1);
    }
}

fn serve(config: &RuntimeConfig) -> Result<()> {
    config.validate()?;

    // ── Setup (plain syscalls, startup only) ──
    let listener = net::listen_tcp(config.port, config.backlog)?;
    let port = net::local_port(listener.as_raw_fd())?;

    let mut backend = UringBackend::new(&config.uring_config())?;
    let pool = RegisteredPool::new(config.pool_entry_size, config.pool_entries)?;
    backend.register_buffers(&pool)?;
    let mut rings = Vec::with_capacity(config.buf_rings.len());
    for params in &config.buf_rings {
        let ring = BufRing::new(*params)?;
        backend.register_buf_ring(&ring)?;
        rings.push(ring);
    }

    // ── Event loop ──
    let mut rt = Runtime::new(backend, pool, rings, config.reply.handler(), config)?;
    rt.listen(listener.as_raw_fd())?;
    info!(port, reply = %config.reply, "ringd-echo listening");
    if config.access_log {
        rt.log_fixed(Level::INFO, format_args!("listening on port {}", port))?;
    }

    let result = rt.run();
    error!(stats = %rt.stats(), "event loop stopped");
    result
}
