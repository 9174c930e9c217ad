//! Transport traits driven by the coordinator
//!
//! Each trait is the contract of one transport handle. Handles know
//! nothing about each other; ordering between them is the coordinator's
//! job. All methods take `&self` so a handle can be shared behind an
//! `Arc` and reused across reconnect attempts.

mod framebuffer;
mod shell;
mod socket;

pub use framebuffer::FramebufferTransport;
pub use shell::ShellTransport;
pub use socket::{DisconnectCallback, SocketTransport};

use std::sync::Arc;

/// One handle per transport kind, as held by a coordinator
#[derive(Clone)]
pub struct TransportSet {
    pub socket: Arc<dyn SocketTransport>,
    pub shell: Arc<dyn ShellTransport>,
    pub framebuffer: Arc<dyn FramebufferTransport>,
}
