//! Message handlers.
//!
//! A handler sees every inbound payload once, inside the dispatch of its
//! receive completion, and says what to send back. The payload borrow ends
//! with the dispatch; the ring buffer behind it is recycled right after.

use std::fmt;
use std::os::fd::RawFd;
use std::str::FromStr;

/// What to send back on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<'a> {
    Nothing,
    /// Sent straight from static memory with `Send`.
    Static(&'static [u8]),
    /// Copied into a registered pool slot and sent with `WriteFixed`.
    Copy(&'a [u8]),
}

pub trait MessageHandler {
    fn on_message<'a>(&mut self, fd: RawFd, payload: &'a [u8]) -> Reply<'a>;
}

impl<H: MessageHandler + ?Sized> MessageHandler for Box<H> {
    fn on_message<'a>(&mut self, fd: RawFd, payload: &'a [u8]) -> Reply<'a> {
        (**self).on_message(fd, payload)
    }
}

/// Answers every message with `OK\n`.
pub struct AckHandler;

pub const ACK: &[u8] = b"OK\n";

impl MessageHandler for AckHandler {
    fn on_message<'a>(&mut self, _fd: RawFd, _payload: &'a [u8]) -> Reply<'a> {
        Reply::Static(ACK)
    }
}

/// Sends the payload back.
pub struct EchoHandler;

impl MessageHandler for EchoHandler {
    fn on_message<'a>(&mut self, _fd: RawFd, payload: &'a [u8]) -> Reply<'a> {
        Reply::Copy(payload)
    }
}

pub struct SilentHandler;

impl MessageHandler for SilentHandler {
    fn on_message<'a>(&mut self, _fd: RawFd, _payload: &'a [u8]) -> Reply<'a> {
        Reply::Nothing
    }
}

/// Built-in reply behaviour, selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    Ack,
    Echo,
    Silent,
}

impl ReplyMode {
    pub fn handler(self) -> Box<dyn MessageHandler> {
        match self {
            Self::Ack => Box::new(AckHandler),
            Self::Echo => Box::new(EchoHandler),
            Self::Silent => Box::new(SilentHandler),
        }
    }
}

impl FromStr for ReplyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ack" => Ok(Self::Ack),
            "echo" => Ok(Self::Echo),
            "silent" | "none" => Ok(Self::Silent),
            other => Err(format!("unknown reply mode {:?}", other)),
        }
    }
}

impl fmt::Display for ReplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ack => "ack",
            Self::Echo => "echo",
            Self::Silent => "silent",
        })
    }
}
