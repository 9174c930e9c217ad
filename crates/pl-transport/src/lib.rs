//! pl-transport: Concrete transports for panelink
//!
//! - [`TcpSocket`]: plain TCP socket used as the device reachability channel
//! - [`SshShell`]: password-authenticated SSH session that starts the
//!   framebuffer server on the device
//! - [`RfbFramebuffer`]: RFB client that captures the front-panel screen
//!   and sends pointer input to it

pub mod framebuffer;
pub mod shell;
pub mod socket;

pub use framebuffer::RfbFramebuffer;
pub use shell::SshShell;
pub use socket::TcpSocket;

use std::sync::Arc;

use pl_core::config::DeviceConfig;
use pl_core::traits::TransportSet;

/// Build the three transport handles for a device
pub fn device_transports(config: &DeviceConfig) -> TransportSet {
    TransportSet {
        socket: Arc::new(TcpSocket::new()),
        shell: Arc::new(SshShell::from_config(config)),
        framebuffer: Arc::new(
            RfbFramebuffer::new(config.framebuffer_timeout).with_rotation(config.rotation),
        ),
    }
}
