//! Error types for the synchronization client

use thiserror::Error;

/// Errors raised by the transport and broker internals.
///
/// The public surface of the broker client and the channel service
/// converts these into boolean returns plus log lines, because the
/// callers are UI flows that must stay responsive. The typed form
/// only travels between the internals and the tests.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;
