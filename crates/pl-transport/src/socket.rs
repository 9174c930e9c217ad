//! TCP socket transport

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex as SyncMutex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use pl_core::traits::{DisconnectCallback, SocketTransport};
use pl_core::{Liveness, TransportError, TransportKind};

/// How long `is_connected` waits for the socket to report EOF or an error.
///
/// Long enough for the I/O driver to deliver a pending hang-up, short
/// enough not to stall the worker.
const PEEK_WINDOW: Duration = Duration::from_millis(10);

/// Timeout applied to `send`/`recv` until `connect` sets one
const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(2);

const PROBE_BYTE: u8 = 0x00;

/// Plain TCP connection to the device
pub struct TcpSocket {
    stream: Mutex<Option<TcpStream>>,
    io_timeout: SyncMutex<Duration>,
    on_disconnect: SyncMutex<Option<DisconnectCallback>>,
}

impl TcpSocket {
    /// Create a disconnected socket
    pub fn new() -> Self {
        Self {
            stream: Mutex::new(None),
            io_timeout: SyncMutex::new(DEFAULT_IO_TIMEOUT),
            on_disconnect: SyncMutex::new(None),
        }
    }

    fn fire_on_disconnect(&self) {
        let callback = self.on_disconnect.lock().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    fn timeout_error() -> TransportError {
        TransportError::Timeout {
            kind: TransportKind::Socket,
        }
    }
}

impl Default for TcpSocket {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SocketTransport for TcpSocket {
    async fn connect(
        &self,
        address: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        let target = format!("{}:{}", address, port);
        tracing::debug!("Opening socket to {}", target);

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&target))
            .await
            .map_err(|_| Self::timeout_error())?
            .map_err(|e| TransportError::ConnectFailed {
                kind: TransportKind::Socket,
                reason: format!("{}: {}", target, e),
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let mut guard = self.stream.lock().await;
        if guard.replace(stream).is_some() {
            tracing::debug!("Replaced a stale socket without firing disconnect");
        }
        *self.io_timeout.lock() = timeout;

        tracing::info!("Socket connected to {}", target);
        Ok(())
    }

    async fn disconnect(&self) {
        let stream = self.stream.lock().await.take();
        let Some(mut stream) = stream else {
            tracing::debug!("Socket already closed");
            return;
        };

        if let Err(e) = stream.shutdown().await {
            // Peer may have reset the connection already
            tracing::debug!("Socket shutdown: {}", e);
        }
        drop(stream);

        tracing::info!("Socket disconnected");
        self.fire_on_disconnect();
    }

    async fn is_connected(&self) -> bool {
        let guard = self.stream.lock().await;
        let Some(stream) = guard.as_ref() else {
            return false;
        };

        let mut buf = [0u8; 1];
        match tokio::time::timeout(PEEK_WINDOW, stream.peek(&mut buf)).await {
            // Nothing to read and no hang-up: open
            Err(_) => true,
            Ok(Ok(0)) => false,
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!("Socket peek failed: {}", e);
                false
            }
        }
    }

    async fn send(&self, data: &[u8]) -> Result<usize, TransportError> {
        let io_timeout = *self.io_timeout.lock();
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or(TransportError::NotConnected(TransportKind::Socket))?;

        tokio::time::timeout(io_timeout, stream.write_all(data))
            .await
            .map_err(|_| Self::timeout_error())??;
        Ok(data.len())
    }

    async fn recv(&self, max_bytes: usize) -> Result<Bytes, TransportError> {
        let io_timeout = *self.io_timeout.lock();
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or(TransportError::NotConnected(TransportKind::Socket))?;

        let mut buf = vec![0u8; max_bytes];
        let n = tokio::time::timeout(io_timeout, stream.read(&mut buf))
            .await
            .map_err(|_| Self::timeout_error())??;
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    async fn probe(&self, timeout: Duration) -> Liveness {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Liveness::Dead;
        };

        if let Err(e) = stream.write_all(&[PROBE_BYTE]).await {
            tracing::debug!("Heartbeat write failed: {}", e);
            return Liveness::Dead;
        }

        let mut reply = [0u8; 1];
        match tokio::time::timeout(timeout, stream.read(&mut reply)).await {
            Ok(Ok(0)) => Liveness::Dead,
            Ok(Ok(_)) => Liveness::Alive,
            Ok(Err(e)) => {
                tracing::debug!("Heartbeat read failed: {}", e);
                Liveness::Dead
            }
            Err(_) => Liveness::Inconclusive,
        }
    }

    fn set_on_disconnect(&self, callback: Option<DisconnectCallback>) {
        *self.on_disconnect.lock() = callback;
    }
}
