//! Network error types
//!
//! Every transport fault falls into one of four recovery classes:
//! connect failures (never retried), transient request failures (retried
//! once), broken connections (reconnect and resend once) and protocol
//! violations (propagated as-is).

use std::io;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Could not resolve server address {0}")]
    AddressResolution(String),

    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("Connection refused by {0}")]
    ConnectRefused(String),

    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(Box<Error>),

    #[error("Request timed out")]
    RequestTimeout,

    #[error("Response was cut short ({received} of {expected} bytes)")]
    PartialRead { expected: usize, received: usize },

    #[error("Connection closed")]
    BrokenConnection,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Poll already in flight")]
    PollInFlight,
}

impl Error {
    /// Failures worth one more attempt over the same connection
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::RequestTimeout | Error::PartialRead { .. })
    }

    /// The stream is gone and must be re-established before resending
    pub fn is_broken(&self) -> bool {
        match self {
            Error::BrokenConnection => true,
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }

    /// The server could not be reached or refused us; not retried
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Error::AddressResolution(_)
                | Error::ConnectTimeout(_)
                | Error::ConnectRefused(_)
                | Error::HandshakeRejected(_)
                | Error::HandshakeFailed(_)
        )
    }
}
