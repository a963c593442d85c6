//! # ringd-core — Vocabulary and trait definitions for ringd
//!
//! This crate defines everything the event loop talks about, without
//! talking to the kernel itself:
//!
//! - the 64-bit operation tag carried in every SQE/CQE `user_data`,
//! - a plain view of a completion (result + flags),
//! - the submission enum and the `IoBackend` trait that queues it,
//! - the buffer ownership protocol (`FixedBufPool`, `ProvidedBufRing`)
//!   and the index ledgers that enforce it,
//! - the error type and environment helpers.
//!
//! ## Design principle
//!
//! > "Program to the interface. Start safe. Optimize with a new impl,
//! >  not by modifying the existing one."
//!
//! The io_uring implementations live in `ringd-module`. The dispatcher in
//! `ringd-executor` is generic over the traits here, so it runs unchanged
//! against a fake backend in tests.

pub mod tag;
pub mod completion;
pub mod submission;
pub mod io_backend;
pub mod buffer;
pub mod freelist;
pub mod ring_ledger;
pub mod error;
pub mod env;
