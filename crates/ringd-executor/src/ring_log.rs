//! Access log lines formatted straight into registered pool slots.
//!
//! Line shape: `<unix-secs>.<millis> [<slot>] [<LEVEL>] <message>\n`.
//! A message longer than the slot is cut; the newline always survives.

use std::fmt::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::Level;

/// `fmt::Write` into a fixed byte slice, dropping what does not fit.
pub struct SlotWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
    truncated: bool,
}

impl<'a> SlotWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0, truncated: false }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

impl Write for SlotWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.buf.len() - self.len;
        let n = s.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        if n < s.len() {
            self.truncated = true;
        }
        // Overflow is recorded, never reported as an error.
        Ok(())
    }
}

/// Format one log line into `buf`, returning the bytes used.
pub fn format_line(
    buf: &mut [u8],
    slot: u16,
    level: Level,
    now: SystemTime,
    args: fmt::Arguments<'_>,
) -> usize {
    if buf.is_empty() {
        return 0;
    }
    let since = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    // Reserve the last byte for the newline.
    let body = buf.len() - 1;
    let mut w = SlotWriter::new(&mut buf[..body]);
    let _ = write!(
        w,
        "{}.{:03} [{}] [{}] {}",
        since.as_secs(),
        since.subsec_millis(),
        slot,
        level,
        args
    );
    let n = w.len();
    buf[n] = b'\n';
    n + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64, millis: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs) + Duration::from_millis(millis)
    }

    #[test]
    fn test_line_format() {
        let mut buf = [0u8; 256];
        let n = format_line(&mut buf, 15, Level::INFO, at(1_700_000_000, 7), format_args!("fd {} len {}", 9, 10));
        assert_eq!(
            std::str::from_utf8(&buf[..n]).unwrap(),
            "1700000000.007 [15] [INFO] fd 9 len 10\n"
        );
    }

    #[test]
    fn test_truncates_but_keeps_newline() {
        let mut buf = [0u8; 24];
        let n = format_line(&mut buf, 0, Level::WARN, at(1, 0), format_args!("{}", "x".repeat(100)));
        assert_eq!(n, 24);
        assert_eq!(buf[23], b'\n');
        assert!(buf[..23].starts_with(b"1.000 [0] [WARN] xxx"));
    }

    #[test]
    fn test_slot_writer_flags_truncation() {
        let mut buf = [0u8; 4];
        let mut w = SlotWriter::new(&mut buf);
        w.write_str("ab").unwrap();
        assert!(!w.truncated());
        w.write_str("cdef").unwrap();
        assert!(w.truncated());
        assert_eq!(w.len(), 4);
        assert_eq!(&buf, b"abcd");
    }
}
