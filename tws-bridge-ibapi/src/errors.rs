//! Error types for the tws-bridge-ibapi library.

use thiserror::Error;

use crate::protocol::client_errors;

/// Top-level error type for the gateway client library.
#[derive(Debug, Error)]
pub enum IBApiError {
    /// TCP connection failure or socket error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Failed to encode a request message, or the server is too old for it.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Failed to decode a response message.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Protocol-level error (version mismatch, bad frame length, redirect).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connection was closed by the peer or by `disconnect`.
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IBApiError {
    /// Client-side error code the TWS API reports for this kind of failure.
    ///
    /// These are the codes an `error` callback carries when the failure
    /// happens in the client rather than in TWS/Gateway.
    pub fn client_code(&self) -> i32 {
        match self {
            Self::Connection(_) => client_errors::CONNECT_FAIL,
            Self::Encoding(_) => client_errors::UPDATE_TWS,
            Self::Decoding(_) => client_errors::BAD_MESSAGE,
            Self::Protocol(_) => client_errors::BAD_LENGTH,
            Self::Disconnected(_) => client_errors::NOT_CONNECTED,
            Self::Io(_) => client_errors::SOCKET_EXCEPTION,
        }
    }
}

/// Convenience Result type for this library.
pub type Result<T> = std::result::Result<T, IBApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_codes() {
        assert_eq!(IBApiError::Encoding("old server".into()).client_code(), 503);
        assert_eq!(IBApiError::Disconnected("eof".into()).client_code(), 504);
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert_eq!(IBApiError::from(io).client_code(), 509);
    }

    #[test]
    fn display_includes_context() {
        let err = IBApiError::Protocol("invalid message length: 0".into());
        assert_eq!(err.to_string(), "Protocol error: invalid message length: 0");
    }
}
