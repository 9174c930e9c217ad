//! Remote framebuffer transport
//!
//! Keeps an RFB session to the device's front-panel server and a local
//! RGBA copy of its screen. Every capture first asks for a full,
//! non-incremental update so the returned image is never stale.
//!
//! Pointer gestures are sent as RFB pointer events. The session tracks
//! the held buttons and last cursor position so a move keeps a drag.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;

use pl_core::traits::FramebufferTransport;
use pl_core::{
    Point, PointerAction, Resolution, ScrollDirection, TransportError, TransportKind,
};
use pl_rfb::{
    button, encoding, handshake, ClientMessage, PixelFormat, Rectangle, RfbCodec, RfbError,
    ServerMessage,
};

const RGBA: usize = 4;

/// How long the button stays down before a drag starts moving
const DRAG_HOLD: Duration = Duration::from_millis(100);

struct RfbSession {
    framed: Framed<TcpStream, RfbCodec>,
    width: u16,
    height: u16,
    /// Screen contents, RGBA, row-major
    frame: Vec<u8>,
    /// Button mask currently held down
    buttons: u8,
    cursor: Point,
}

impl RfbSession {
    fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    async fn send_pointer(&mut self, buttons: u8, at: Point) -> Result<(), TransportError> {
        let at = self.resolution().clamp(at);
        self.framed
            .send(ClientMessage::PointerEvent {
                buttons,
                x: at.x,
                y: at.y,
            })
            .await?;
        self.buttons = buttons;
        self.cursor = at;
        Ok(())
    }

    async fn perform(&mut self, action: &PointerAction) -> Result<(), TransportError> {
        match *action {
            PointerAction::Click(at) => {
                self.send_pointer(self.buttons, at).await?;
                self.send_pointer(self.buttons | button::LEFT, at).await?;
                self.send_pointer(self.buttons & !button::LEFT, at).await
            }
            PointerAction::Drag { from, to } => {
                self.send_pointer(self.buttons, from).await?;
                self.send_pointer(self.buttons | button::LEFT, from).await?;
                tokio::time::sleep(DRAG_HOLD).await;
                self.send_pointer(self.buttons, to).await?;
                self.send_pointer(self.buttons & !button::LEFT, to).await
            }
            PointerAction::Press(at) => {
                self.send_pointer(self.buttons, at).await?;
                self.send_pointer(self.buttons | button::LEFT, at).await
            }
            PointerAction::Move(at) => self.send_pointer(self.buttons, at).await,
            PointerAction::Release(at) => {
                self.send_pointer(self.buttons, at).await?;
                self.send_pointer(self.buttons & !button::LEFT, at).await
            }
            PointerAction::Scroll {
                direction,
                steps,
                at,
            } => {
                let at = match at {
                    Some(at) => {
                        self.send_pointer(self.buttons, at).await?;
                        at
                    }
                    None => self.cursor,
                };
                let wheel = wheel_button(direction);
                for _ in 0..steps {
                    self.send_pointer(self.buttons | wheel, at).await?;
                    self.send_pointer(self.buttons & !wheel, at).await?;
                }
                Ok(())
            }
        }
    }

    fn apply(&mut self, rect: &Rectangle) {
        if rect.encoding != encoding::RAW {
            return;
        }
        let format = *self.framed.codec().pixel_format();
        let bpp = format.bytes_per_pixel();
        let screen_width = self.width as usize;

        for row in 0..rect.height as usize {
            let y = rect.y as usize + row;
            if y >= self.height as usize {
                break;
            }
            for col in 0..rect.width as usize {
                let x = rect.x as usize + col;
                if x >= screen_width {
                    break;
                }
                let src = (row * rect.width as usize + col) * bpp;
                let Some(pixel) = rect.pixels.get(src..src + bpp) else {
                    return;
                };
                let dst = (y * screen_width + x) * RGBA;
                self.frame[dst..dst + RGBA].copy_from_slice(&to_rgba(&format, pixel));
            }
        }
    }

    fn encode_png(&self) -> Result<Bytes, TransportError> {
        let image = RgbaImage::from_raw(self.width as u32, self.height as u32, self.frame.clone())
            .ok_or_else(|| TransportError::Image("frame buffer size mismatch".to_string()))?;

        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| TransportError::Image(e.to_string()))?;
        Ok(Bytes::from(png.into_inner()))
    }
}

fn wheel_button(direction: ScrollDirection) -> u8 {
    match direction {
        ScrollDirection::Up => button::WHEEL_UP,
        ScrollDirection::Down => button::WHEEL_DOWN,
        ScrollDirection::Left => button::WHEEL_LEFT,
        ScrollDirection::Right => button::WHEEL_RIGHT,
    }
}

/// Convert one true-colour pixel to RGBA
fn to_rgba(format: &PixelFormat, pixel: &[u8]) -> [u8; RGBA] {
    let mut word = [0u8; 4];
    let n = pixel.len().min(4);
    let value = if format.big_endian {
        word[4 - n..].copy_from_slice(&pixel[..n]);
        u32::from_be_bytes(word)
    } else {
        word[..n].copy_from_slice(&pixel[..n]);
        u32::from_le_bytes(word)
    };

    let channel = |shift: u8, max: u16| -> u8 {
        if max == 0 {
            return 0;
        }
        let raw = (value >> shift) & max as u32;
        (raw * 255 / max as u32) as u8
    };

    [
        channel(format.red_shift, format.red_max),
        channel(format.green_shift, format.green_max),
        channel(format.blue_shift, format.blue_max),
        u8::MAX,
    ]
}

/// RFB client for the device's front panel
pub struct RfbFramebuffer {
    session: Mutex<Option<RfbSession>>,
    io_timeout: Duration,
    rotation: u16,
}

impl RfbFramebuffer {
    /// Create a disconnected framebuffer transport
    ///
    /// `io_timeout` bounds each refresh round trip.
    pub fn new(io_timeout: Duration) -> Self {
        Self {
            session: Mutex::new(None),
            io_timeout,
            rotation: 0,
        }
    }

    /// Rotation in degrees the device's panel server runs with
    pub fn with_rotation(mut self, rotation: u16) -> Self {
        self.rotation = rotation;
        self
    }

    async fn open(address: &str, port: u16) -> Result<RfbSession, TransportError> {
        let target = format!("{}:{}", address, port);
        let mut stream =
            TcpStream::connect(&target)
                .await
                .map_err(|e| TransportError::ConnectFailed {
                    kind: TransportKind::Framebuffer,
                    reason: format!("{}: {}", target, e),
                })?;

        let (version, init) = handshake(&mut stream, true).await?;
        tracing::debug!(?version, "Framebuffer handshake complete");

        let mut framed = Framed::new(stream, RfbCodec::new(init.pixel_format));
        framed
            .send(ClientMessage::SetPixelFormat(PixelFormat::rgbx8888()))
            .await?;
        framed
            .send(ClientMessage::SetEncodings(vec![encoding::RAW]))
            .await?;

        let mut frame = vec![0u8; init.width as usize * init.height as usize * RGBA];
        for pixel in frame.chunks_exact_mut(RGBA) {
            pixel[3] = u8::MAX;
        }

        Ok(RfbSession {
            framed,
            width: init.width,
            height: init.height,
            frame,
            buttons: button::NONE,
            cursor: Point::new(0, 0),
        })
    }

    async fn refresh_session(
        session: &mut RfbSession,
        io_timeout: Duration,
    ) -> Result<(), TransportError> {
        session
            .framed
            .send(ClientMessage::full_update(session.width, session.height))
            .await?;

        let update = async {
            loop {
                match session.framed.next().await {
                    Some(Ok(ServerMessage::FramebufferUpdate(rects))) => return Ok(rects),
                    Some(Ok(other)) => tracing::trace!("Ignoring server message: {:?}", other),
                    Some(Err(e)) => return Err(e),
                    None => return Err(RfbError::ConnectionClosed),
                }
            }
        };

        let rects = tokio::time::timeout(io_timeout, update)
            .await
            .map_err(|_| TransportError::Timeout {
                kind: TransportKind::Framebuffer,
            })??;

        for rect in &rects {
            session.apply(rect);
        }
        tracing::trace!("Applied {} rectangle(s)", rects.len());
        Ok(())
    }

    /// Refresh under the lock, dropping the session if the link broke
    async fn refresh_locked(
        &self,
        guard: &mut Option<RfbSession>,
    ) -> Result<(), TransportError> {
        let session = guard
            .as_mut()
            .ok_or(TransportError::NotConnected(TransportKind::Framebuffer))?;

        if let Err(e) = Self::refresh_session(session, self.io_timeout).await {
            tracing::debug!("Framebuffer refresh failed, closing session: {}", e);
            *guard = None;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl FramebufferTransport for RfbFramebuffer {
    async fn connect(
        &self,
        address: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        let mut guard = self.session.lock().await;

        let session = tokio::time::timeout(timeout, Self::open(address, port))
            .await
            .map_err(|_| TransportError::Timeout {
                kind: TransportKind::Framebuffer,
            })??;

        tracing::info!(
            "Framebuffer connected to {}:{} ({}x{})",
            address,
            port,
            session.width,
            session.height
        );
        *guard = Some(session);
        Ok(())
    }

    async fn capture_frame(&self) -> Result<Bytes, TransportError> {
        let mut guard = self.session.lock().await;
        self.refresh_locked(&mut guard).await?;

        match guard.as_ref() {
            Some(session) => session.encode_png(),
            None => Err(TransportError::NotConnected(TransportKind::Framebuffer)),
        }
    }

    async fn refresh(&self) -> Result<(), TransportError> {
        let mut guard = self.session.lock().await;
        self.refresh_locked(&mut guard).await
    }

    async fn resolution(&self) -> Result<Resolution, TransportError> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(RfbSession::resolution)
            .ok_or(TransportError::NotConnected(TransportKind::Framebuffer))
    }

    async fn pointer(&self, action: &PointerAction) -> Result<(), TransportError> {
        let mut guard = self.session.lock().await;
        let session = guard
            .as_mut()
            .ok_or(TransportError::NotConnected(TransportKind::Framebuffer))?;

        tracing::debug!("Pointer: {}", action);
        if let Err(e) = session.perform(action).await {
            tracing::debug!("Pointer event failed, closing session: {}", e);
            *guard = None;
            return Err(e);
        }
        Ok(())
    }

    fn rotation(&self) -> u16 {
        self.rotation
    }

    async fn disconnect(&self) {
        let session = self.session.lock().await.take();
        match session {
            Some(session) => {
                let mut stream = session.framed.into_inner();
                if let Err(e) = tokio::io::AsyncWriteExt::shutdown(&mut stream).await {
                    tracing::debug!("Framebuffer shutdown: {}", e);
                }
                tracing::info!("Framebuffer disconnected");
            }
            None => tracing::debug!("Framebuffer already closed"),
        }
    }
}
