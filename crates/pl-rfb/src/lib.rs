//! pl-rfb: Remote framebuffer protocol for panelink
//!
//! This crate implements the client side of the RFB protocol (versions
//! 3.3, 3.7 and 3.8) as spoken by the front-panel server running on the
//! device: the initial handshake, the client-to-server messages needed
//! to request screen contents and send pointer input, and a tokio codec
//! for server messages.

pub mod codec;
pub mod error;
pub mod handshake;
pub mod message;

pub use codec::RfbCodec;
pub use error::RfbError;
pub use handshake::{handshake, ProtocolVersion};
pub use message::{button, encoding, ClientMessage, PixelFormat, Rectangle, ServerInit, ServerMessage};
