//! Socket transport trait

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TransportError;
use crate::types::Liveness;

/// Callback invoked when a socket goes from connected to disconnected
pub type DisconnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Raw socket to the device, the base transport
#[async_trait]
pub trait SocketTransport: Send + Sync {
    /// Open the socket. Every failure is returned, never raised.
    async fn connect(&self, address: &str, port: u16, timeout: Duration)
        -> Result<(), TransportError>;

    /// Close the socket
    ///
    /// Idempotent. Fires the disconnect callback only when this call
    /// actually moved the handle from connected to disconnected.
    async fn disconnect(&self);

    /// Check the live descriptor, not a cached flag
    async fn is_connected(&self) -> bool;

    /// Write `data`, returning the number of bytes written
    async fn send(&self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read up to `max_bytes`. An empty result means the peer closed.
    async fn recv(&self, max_bytes: usize) -> Result<Bytes, TransportError>;

    /// Send a one-byte probe and wait for any one-byte answer
    async fn probe(&self, timeout: Duration) -> Liveness;

    /// Register (or clear) the disconnect callback
    fn set_on_disconnect(&self, callback: Option<DisconnectCallback>);
}
