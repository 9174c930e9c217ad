//! Framebuffer transport trait

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::TransportError;
use crate::pointer::{Point, PointerAction, Resolution, ViewPoint};

/// Remote framebuffer session
///
/// The server on the device is started by the shell transport, so
/// connecting only makes sense once the shell is up. That ordering is
/// enforced by the coordinator, not here.
#[async_trait]
pub trait FramebufferTransport: Send + Sync {
    /// Open a session to `address:port`
    async fn connect(&self, address: &str, port: u16, timeout: Duration)
        -> Result<(), TransportError>;

    /// Capture the current screen as PNG bytes
    async fn capture_frame(&self) -> Result<Bytes, TransportError>;

    /// Ask the server for a full screen refresh
    async fn refresh(&self) -> Result<(), TransportError>;

    /// Screen size announced when the session was opened
    async fn resolution(&self) -> Result<Resolution, TransportError>;

    /// Send one pointer gesture. Positions outside the screen are clamped.
    async fn pointer(&self, action: &PointerAction) -> Result<(), TransportError>;

    /// Close the session. Idempotent.
    async fn disconnect(&self);

    /// There is no cheap liveness flag for this transport; a refresh
    /// round trip is the check.
    async fn is_connected(&self) -> bool {
        self.refresh().await.is_ok()
    }

    /// Rotation in degrees the panel server was started with
    fn rotation(&self) -> u16 {
        0
    }

    async fn click(&self, at: Point) -> Result<(), TransportError> {
        self.pointer(&PointerAction::Click(at)).await
    }

    async fn drag(&self, from: Point, to: Point) -> Result<(), TransportError> {
        self.pointer(&PointerAction::Drag { from, to }).await
    }

    /// Map a position on a scaled, rotated view to a screen position
    async fn map_view_point(&self, view: &ViewPoint) -> Result<Point, TransportError> {
        let resolution = self.resolution().await?;
        resolution
            .map_view_point(view, self.rotation())
            .ok_or_else(|| {
                TransportError::InvalidInput(format!(
                    "view size {}x{} is empty",
                    view.width, view.height
                ))
            })
    }
}
