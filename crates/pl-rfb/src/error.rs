//! Protocol error types

use thiserror::Error;

/// Errors that can occur while speaking RFB
#[derive(Error, Debug)]
pub enum RfbError {
    /// Server announced a protocol version we cannot speak
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    /// Server refused the connection during the security handshake
    #[error("Security handshake failed: {0}")]
    SecurityFailure(String),

    /// Server offered no security type we implement
    #[error("No supported security type offered (server offered {0:?})")]
    UnsupportedSecurity(Vec<u8>),

    /// Unknown server-to-client message type
    #[error("Unknown server message type: {0}")]
    UnknownMessageType(u8),

    /// Rectangle sent with an encoding we never asked for
    #[error("Unsupported rectangle encoding: {0}")]
    UnsupportedEncoding(i32),

    /// Length field exceeds what we are willing to buffer
    #[error("Payload too large: {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// Server closed the stream
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
