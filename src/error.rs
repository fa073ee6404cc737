//! Error types observed at the worker boundary

use std::time::Duration;

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Coarse classification used by the worker loop to bump the right
/// error counter. Status errors (code > 399) are not part of this
/// taxonomy: they come from successfully parsed responses and never
/// terminate a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A read deadline fired; counted in `timeout_errors`
    Timeout,
    /// Any other transport or parse failure; counted in `connection_errors`
    Connection,
}

/// Errors surfaced by a client backend or its workers
///
/// Classification happens through [`ClientError::kind`] rather than by
/// matching on the display text; the timeout variants still render with
/// "timeout" in their message so the textual contract holds for callers
/// that only see the formatted error.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The per-cycle read deadline fired before the response completed
    #[error("read timeout after {0:?}")]
    Timeout(Duration),

    /// Establishing the connection took longer than the configured timeout
    #[error("connect timeout after {0:?}")]
    ConnectTimeout(Duration),

    /// Transport-level IO failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS setup or handshake failure
    #[error("tls error: {0}")]
    Tls(#[from] native_tls::Error),

    /// The peer closed the connection before a full response was read
    #[error("connection closed before the response completed")]
    UnexpectedEof,

    /// The header section did not fit in the receive buffer
    #[error("receive buffer full, no CRLFCRLF after {0} bytes")]
    BufferFull(usize),

    /// The response bytes violated the parser's framing assumptions
    #[error("malformed response: {0}")]
    Parse(&'static str),

    /// The target URL could not be parsed
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The URL scheme is neither `http` nor `https`
    #[error("unsupported scheme `{0}`")]
    UnsupportedScheme(String),

    /// A header or method could not be converted for a library backend
    #[error("invalid request part: {0}")]
    InvalidRequest(String),

    /// Error from the `full` (reqwest) backend
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error from the `pooled` (hyper) backend
    #[error("pooled client error: {0}")]
    Pooled(#[from] hyper_util::client::legacy::Error),

    /// HTTP protocol error from the hyper connection
    #[error("http protocol error: {0}")]
    Protocol(#[from] hyper::Error),
}

impl ClientError {
    /// Classify this error for the timeout/connection counters
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Timeout(_) | ClientError::ConnectTimeout(_) => ErrorKind::Timeout,
            ClientError::Io(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                ErrorKind::Timeout
            }
            ClientError::Http(e) if e.is_timeout() => ErrorKind::Timeout,
            _ => ErrorKind::Connection,
        }
    }

    /// Whether this error counts as a timeout
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_classification() {
        assert_eq!(
            ClientError::Timeout(Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            ClientError::ConnectTimeout(Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
        let io = ClientError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert_eq!(io.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn connection_classification() {
        assert_eq!(ClientError::UnexpectedEof.kind(), ErrorKind::Connection);
        assert_eq!(ClientError::BufferFull(4096).kind(), ErrorKind::Connection);
        assert_eq!(
            ClientError::Parse("status line too short").kind(),
            ErrorKind::Connection
        );
        let reset = ClientError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert_eq!(reset.kind(), ErrorKind::Connection);
    }

    #[test]
    fn timeout_text_contains_timeout() {
        let msg = ClientError::Timeout(Duration::from_secs(1)).to_string();
        assert!(msg.to_lowercase().contains("timeout"));
    }
}
