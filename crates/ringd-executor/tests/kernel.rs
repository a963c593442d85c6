//! End-to-end runs of the event loop on a real io_uring instance with
//! loopback TCP clients.
//!
//! Covers what the in-crate fakes cannot: SQE construction, buffer and
//! buffer-ring registration, and the completions the kernel actually
//! posts (multishot accept, recvmsg envelopes, `-ENOBUFS`, peer close).
//! Each test returns early when the kernel refuses io_uring setup.

use ringd_core::buffer::{BufRingParams, FixedBufPool, ProvidedBufRing};
use ringd_core::error::RingdError;
use ringd_executor::handler::ACK;
use ringd_executor::{MessageHandler, ReplyMode, Runtime, RuntimeConfig};
use ringd_module::{net, BufRing, RegisteredPool, UringBackend};

use std::io::{Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type KernelRuntime = Runtime<UringBackend, RegisteredPool, BufRing, Box<dyn MessageHandler>>;

/// Upper bound on turns spent waiting for one condition.
const MAX_TURNS: usize = 256;

/// Aborts the process if a blocking `turn()` never returns.
struct Watchdog(Arc<AtomicBool>);

impl Watchdog {
    fn arm(name: &'static str) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(30);
            while Instant::now() < deadline {
                if flag.load(Ordering::Relaxed) {
                    return;
                }
                thread::sleep(Duration::from_millis(50));
            }
            eprintln!("{}: event loop stalled", name);
            std::process::abort();
        });
        Self(done)
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

struct Server {
    // Dropped before the listener it accepts on.
    rt: KernelRuntime,
    port: u16,
    _listener: OwnedFd,
}

/// Backend, pool and rings registered the way `ringd-echo` does it.
fn server(config: RuntimeConfig) -> Option<Server> {
    let mut backend = match UringBackend::new(&config.uring_config()) {
        Ok(backend) => backend,
        Err(RingdError::IoUringSetup(errno)) => {
            eprintln!("io_uring unavailable (errno {}), skipping", errno);
            return None;
        }
        Err(e) => panic!("backend setup: {}", e),
    };
    let pool = RegisteredPool::new(config.pool_entry_size, config.pool_entries).unwrap();
    backend.register_buffers(&pool).unwrap();
    let rings: Vec<BufRing> = config
        .buf_rings
        .iter()
        .map(|&params| BufRing::new(params).unwrap())
        .collect();
    for ring in &rings {
        backend.register_buf_ring(ring).unwrap();
    }

    let listener = net::listen_tcp(0, config.backlog).unwrap();
    let port = net::local_port(listener.as_raw_fd()).unwrap();
    let mut rt = Runtime::new(backend, pool, rings, config.reply.handler(), &config).unwrap();
    rt.listen(listener.as_raw_fd()).unwrap();
    Some(Server { rt, port, _listener: listener })
}

fn turn_until(rt: &mut KernelRuntime, what: &str, done: impl Fn(&KernelRuntime) -> bool) {
    for _ in 0..MAX_TURNS {
        if done(&*rt) {
            return;
        }
        rt.turn().unwrap();
    }
    assert!(done(&*rt), "{} not reached in {} turns: {}", what, MAX_TURNS, rt.stats());
}

fn connect(s: &mut Server) -> TcpStream {
    let client = TcpStream::connect(("127.0.0.1", s.port)).unwrap();
    client.set_nodelay(true).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let want = s.rt.stats().accepts + 1;
    turn_until(&mut s.rt, "accept", |rt| rt.stats().accepts >= want);
    client
}

#[test]
fn test_kernel_ack_round_trip_then_peer_close() {
    let _dog = Watchdog::arm("ack round trip");
    let Some(mut s) = server(RuntimeConfig::new().access_log(false)) else {
        return;
    };
    let mut client = connect(&mut s);
    assert_eq!(s.rt.conns().len(), 1);

    client.write_all(b"hello").unwrap();
    turn_until(&mut s.rt, "message", |rt| rt.stats().messages == 1);
    let mut reply = [0u8; 3];
    client.read_exact(&mut reply).unwrap();
    assert_eq!(&reply[..], ACK);
    assert_eq!(s.rt.stats().bytes_in, 5);
    assert_eq!(s.rt.ring(0).unwrap().kernel_visible(), 16);

    drop(client);
    turn_until(&mut s.rt, "close", |rt| rt.stats().closes == 1);
    assert!(s.rt.conns().is_empty());
    // The FIN was not taken for a message.
    assert_eq!(s.rt.stats().messages, 1);
    assert_eq!(s.rt.stats().replies, 1);
    assert_eq!(s.rt.ring(0).unwrap().held(), 0);
}

#[test]
fn test_kernel_echo_uses_fixed_write_and_frees_slot() {
    let _dog = Watchdog::arm("echo round trip");
    let config = RuntimeConfig::new().reply(ReplyMode::Echo).access_log(false);
    let Some(mut s) = server(config) else {
        return;
    };
    let mut client = connect(&mut s);

    client.write_all(b"hello").unwrap();
    turn_until(&mut s.rt, "message", |rt| rt.stats().messages == 1);
    let mut reply = [0u8; 5];
    client.read_exact(&mut reply).unwrap();
    assert_eq!(&reply, b"hello");

    turn_until(&mut s.rt, "slot release", |rt| rt.pool().available() == 16);
    assert_eq!(s.rt.stats().replies_dropped, 0);

    drop(client);
    turn_until(&mut s.rt, "close", |rt| rt.stats().closes == 1);
    assert!(s.rt.conns().is_empty());
}

#[test]
fn test_kernel_enobufs_rearm_delivers_everything() {
    let _dog = Watchdog::arm("enobufs");
    // One buffer with room for 4 payload bytes after the recvmsg header:
    // a 20-byte burst must run the ring dry.
    let config = RuntimeConfig::new()
        .buf_rings(vec![BufRingParams::new(1, 20, 0)])
        .reply(ReplyMode::Silent)
        .access_log(false);
    let Some(mut s) = server(config) else {
        return;
    };
    let mut client = connect(&mut s);

    let burst = b"abcdefghijklmnopqrst";
    client.write_all(burst).unwrap();
    turn_until(&mut s.rt, "all bytes", |rt| rt.stats().bytes_in == burst.len() as u64);
    assert!(s.rt.stats().recv_enobufs >= 1, "{}", s.rt.stats());
    assert!(s.rt.stats().recv_rearms >= 1, "{}", s.rt.stats());
    assert_eq!(s.rt.conns().len(), 1);

    drop(client);
    turn_until(&mut s.rt, "close", |rt| rt.stats().closes == 1);
    assert!(s.rt.conns().is_empty());
    assert_eq!(s.rt.ring(0).unwrap().kernel_visible(), 1);
}
