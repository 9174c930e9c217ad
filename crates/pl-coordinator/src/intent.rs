//! Queued connection requests

use bytes::Bytes;
use std::time::Duration;
use tokio::sync::oneshot;

use pl_core::{
    CommandOutput, CoordinatorError, Credentials, Point, PointerAction, Resolution, ViewPoint,
};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, CoordinatorError>>;

/// One unit of work for the connection worker
///
/// Intents are executed exactly once, in the order they were queued.
pub(crate) enum Intent {
    ConnectSocket {
        address: String,
        port: u16,
        timeout: Duration,
    },
    ConnectShell {
        address: String,
        credentials: Credentials,
        timeout: Duration,
    },
    ConnectFramebuffer {
        address: String,
        port: u16,
        timeout: Duration,
    },
    DisconnectSocket,
    DisconnectShell,
    DisconnectFramebuffer,
    DisconnectAll,
    /// The socket went away without being asked to
    SocketLost,
    /// Watchdog tick
    CheckSocket,
    CaptureFrame(Reply<Bytes>),
    RunShellCommand {
        command: String,
        reply: Reply<CommandOutput>,
    },
    Pointer {
        action: PointerAction,
        reply: Reply<()>,
    },
    Resolution(Reply<Resolution>),
    MapViewPoint {
        view: ViewPoint,
        reply: Reply<Point>,
    },
    /// Resolves once everything queued before it has run
    Flush(oneshot::Sender<()>),
}

impl Intent {
    /// Short name for logs
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Intent::ConnectSocket { .. } => "connect_socket",
            Intent::ConnectShell { .. } => "connect_shell",
            Intent::ConnectFramebuffer { .. } => "connect_framebuffer",
            Intent::DisconnectSocket => "disconnect_socket",
            Intent::DisconnectShell => "disconnect_shell",
            Intent::DisconnectFramebuffer => "disconnect_framebuffer",
            Intent::DisconnectAll => "disconnect_all",
            Intent::SocketLost => "socket_lost",
            Intent::CheckSocket => "check_socket",
            Intent::CaptureFrame(_) => "capture_frame",
            Intent::RunShellCommand { .. } => "run_shell_command",
            Intent::Pointer { .. } => "pointer",
            Intent::Resolution(_) => "resolution",
            Intent::MapViewPoint { .. } => "map_view_point",
            Intent::Flush(_) => "flush",
        }
    }
}

impl std::fmt::Debug for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::ConnectSocket { address, port, .. }
            | Intent::ConnectFramebuffer { address, port, .. } => {
                write!(f, "{}({}:{})", self.name(), address, port)
            }
            Intent::ConnectShell {
                address,
                credentials,
                ..
            } => write!(f, "{}({}@{})", self.name(), credentials.username, address),
            Intent::RunShellCommand { command, .. } => {
                write!(f, "{}({:?})", self.name(), command)
            }
            Intent::Pointer { action, .. } => write!(f, "{}({})", self.name(), action),
            _ => f.write_str(self.name()),
        }
    }
}
