//! I/O backend abstraction.
//!
//! An `IoBackend` owns the submission/completion queue pair.
//!
//! # Implementors
//!
//! - `UringBackend` (ringd-module): the `io-uring` crate, optionally with
//!   SQPOLL. Also registers fixed buffers and buffer rings.
//!
//! - `FakeBackend` (tests in ringd-executor): records submissions and
//!   replays scripted completions. No kernel involved.

use crate::completion::Completion;
use crate::error::Result;
use crate::submission::Submission;

/// Queue submissions, kick them, wait for and drain completions.
///
/// The event loop calls, per turn:
/// 1. `wait(1)`: the only place the thread blocks,
/// 2. `drain()`: moves every ready CQE out of the ring,
/// 3. `push()`: zero or more times while dispatching,
/// 4. `flush()`: once, to submit the whole batch.
pub trait IoBackend {
    /// Queue one submission. Not yet visible to the kernel.
    ///
    /// Implementations may flush internally when the SQ is full; they
    /// return `Err(RingFull)` only if that does not free a slot.
    fn push(&mut self, sub: Submission) -> Result<()>;

    /// Submit everything queued. Returns the number submitted.
    fn flush(&mut self) -> Result<usize>;

    /// Submit everything queued and block until `want` completions exist.
    fn wait(&mut self, want: usize) -> Result<usize>;

    /// Append all ready completions to `out`. Never blocks.
    fn drain(&mut self, out: &mut Vec<Completion>) -> usize;

    /// Submissions queued since the last flush.
    fn pending(&self) -> usize;
}
