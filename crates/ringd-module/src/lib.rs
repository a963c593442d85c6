//! # ringd-module — io_uring implementations
//!
//! Each `ringd-core` trait gets one concrete, kernel-backed implementation
//! here. The executor stays generic, so tests swap these for fakes.
//!
//! | Trait / concern  | Impl            | Notes                              |
//! |------------------|-----------------|------------------------------------|
//! | IoBackend        | UringBackend    | optional SQPOLL, registration      |
//! | FixedBufPool     | RegisteredPool  | LIFO free list, WRITE_FIXED slots  |
//! | ProvidedBufRing  | BufRing         | IORING_REGISTER_PBUF_RING          |
//! | listener         | net::listen_tcp | plain syscalls at startup          |

pub mod uring_backend;
pub mod regbuf_pool;
pub mod buf_ring;
pub mod net;

pub use buf_ring::BufRing;
pub use regbuf_pool::RegisteredPool;
pub use uring_backend::{UringBackend, UringConfig};
