//! Incremental HTTP/1.1 response parser over a fixed buffer
//!
//! Tuned for load generation rather than correctness checking: only the
//! status code and `Content-Length` are extracted, nothing is allocated
//! per response, and body bytes are drained without being retained.
//!
//! Framing assumptions, documented limitations included:
//! - the status line is `HTTP/1.1` with the code at bytes 9..12;
//! - `Content-Length` matching is byte-exact and case-sensitive;
//! - headers are `Name: Value` with a single space after the colon;
//! - chunked transfer encoding and `Connection: close` framing are not
//!   supported; a missing `Content-Length` means an empty body.

use crate::error::{ClientError, Result};

const CRLF_CRLF: &[u8] = b"\r\n\r\n";
const CONTENT_LENGTH: &[u8] = b"Content-Length";

/// Parser state for one in-flight response
///
/// The receive buffer is allocated once at worker construction and
/// reused for every cycle; [`ResponseParser::reset`] rearms the state
/// without touching the allocation.
#[derive(Debug)]
pub struct ResponseParser {
    buf: Vec<u8>,
    status_code: u16,
    content_length: usize,
    /// Offset of the first body byte; valid only after `parse_headers`
    body_start: usize,
    /// Upper bound of the region already searched for the terminator
    scan_cursor: usize,
}

impl ResponseParser {
    /// Allocate a parser with a fixed receive buffer
    pub fn new(max_response_size: usize) -> Self {
        Self {
            buf: vec![0; max_response_size],
            status_code: 0,
            content_length: 0,
            body_start: 0,
            scan_cursor: 0,
        }
    }

    /// Rearm for the next response; the buffer allocation is kept
    pub fn reset(&mut self) {
        self.status_code = 0;
        self.content_length = 0;
        self.body_start = 0;
        self.scan_cursor = 0;
    }

    /// Receive buffer capacity
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// The receive buffer, for reads to fill
    pub fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Status code extracted by [`ResponseParser::parse_headers`]
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Content-Length extracted by [`ResponseParser::parse_headers`];
    /// zero when the header is absent
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Offset of the first body byte within the buffer
    pub fn body_start(&self) -> usize {
        self.body_start
    }

    /// Search `buf[..len]` for the CRLFCRLF header terminator
    ///
    /// The scan resumes three bytes before the already-searched region
    /// so a terminator split across two reads is still found; the
    /// cursor itself never moves backwards. On a hit, `body_start` is
    /// set past the terminator.
    pub fn find_header_end(&mut self, len: usize) -> bool {
        let start = self.scan_cursor.saturating_sub(3);
        match self.buf[start..len]
            .windows(CRLF_CRLF.len())
            .position(|w| w == CRLF_CRLF)
        {
            Some(i) => {
                self.body_start = start + i + CRLF_CRLF.len();
                true
            }
            None => {
                self.scan_cursor = len;
                false
            }
        }
    }

    /// Parse the status line and headers; synchronous, no I/O
    ///
    /// Must only be called after `find_header_end` returned true.
    pub fn parse_headers(&mut self) -> Result<()> {
        // "HTTP/1.1 XYZ " plus the terminator is the shortest head the
        // constant-offset status parse can handle
        if self.body_start < 16 {
            return Err(ClientError::Parse("status line too short"));
        }
        self.status_code = parse_status_code(&self.buf[9..12]);

        let line_end = match self.buf[12..self.body_start].iter().position(|&b| b == b'\r') {
            Some(i) => 12 + i,
            None => return Err(ClientError::Parse("status line not terminated")),
        };
        self.content_length =
            content_length_from_headers(&self.buf[line_end + 2..self.body_start - 2]);
        Ok(())
    }

    /// Whether the body has been fully drained given the total bytes
    /// read for this response
    pub fn is_body_complete(&self, total: usize) -> bool {
        total - self.body_start >= self.content_length
    }
}

/// Status code from the three ASCII digits at bytes 9..12
///
/// 100·d0 + 10·d1 + d2 − 5328 with the subtraction folded into one
/// constant; assumes ASCII digits, garbage in gives garbage out.
fn parse_status_code(b: &[u8]) -> u16 {
    (u16::from(b[0]) * 100 + u16::from(b[1]) * 10 + u16::from(b[2])).wrapping_sub(5328)
}

/// Walk header lines and return the first Content-Length value
///
/// The region covers everything between the status line and the final
/// CRLF of the terminator, so every line in it ends with `\r\n`. The
/// name comparison is case-sensitive; the first match wins.
fn content_length_from_headers(mut b: &[u8]) -> usize {
    while let Some(i) = b.iter().position(|&c| c == b'\r') {
        let line = &b[..i];
        b = &b[(i + 2).min(b.len())..];
        if let Some(sep) = line.iter().position(|&c| c == b':') {
            if &line[..sep] == CONTENT_LENGTH {
                // header format is assumed "Name: Value"
                return match line.get(sep + 2..) {
                    Some(value) => parse_content_length(value),
                    None => 0,
                };
            }
        }
    }
    0
}

/// Digit parser dispatched on length, optimized for 1-4 digit values
///
/// The per-length constants fold the ASCII offset into one subtraction;
/// longer values fall back to the generic accumulate loop.
fn parse_content_length(b: &[u8]) -> usize {
    let d = |i: usize| b[i] as usize;
    match b.len() {
        1 => d(0).wrapping_sub(48),
        2 => (d(0) * 10 + d(1)).wrapping_sub(528),
        3 => (d(0) * 100 + d(1) * 10 + d(2)).wrapping_sub(5328),
        4 => (d(0) * 1000 + d(1) * 100 + d(2) * 10 + d(3)).wrapping_sub(53328),
        _ => b
            .iter()
            .fold(0usize, |acc, &c| acc * 10 + (c as usize).wrapping_sub(48)),
    }
}
