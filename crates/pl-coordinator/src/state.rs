//! Connection flags shared between the worker and callers

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use pl_core::TransportKind;

/// Point-in-time copy of the three connection flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub socket: bool,
    pub shell: bool,
    pub framebuffer: bool,
}

impl ConnectionSnapshot {
    /// Flag for one transport
    pub fn get(&self, kind: TransportKind) -> bool {
        match kind {
            TransportKind::Socket => self.socket,
            TransportKind::Shell => self.shell,
            TransportKind::Framebuffer => self.framebuffer,
        }
    }

    /// Whether no transport is up
    pub fn is_idle(&self) -> bool {
        !(self.socket || self.shell || self.framebuffer)
    }
}

/// Thread-safe tri-flag record
///
/// Only the worker writes; anyone may read. All three flags sit behind a
/// single lock so a snapshot is never torn, but each flag is still set on
/// its own.
#[derive(Debug, Default)]
pub struct ConnectionState {
    flags: Mutex<ConnectionSnapshot>,
}

impl ConnectionState {
    /// All flags false
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: TransportKind) -> bool {
        self.flags.lock().get(kind)
    }

    pub fn set(&self, kind: TransportKind, connected: bool) {
        let mut flags = self.flags.lock();
        match kind {
            TransportKind::Socket => flags.socket = connected,
            TransportKind::Shell => flags.shell = connected,
            TransportKind::Framebuffer => flags.framebuffer = connected,
        }
    }

    pub fn is_socket_connected(&self) -> bool {
        self.get(TransportKind::Socket)
    }

    pub fn is_shell_connected(&self) -> bool {
        self.get(TransportKind::Shell)
    }

    pub fn is_framebuffer_connected(&self) -> bool {
        self.get(TransportKind::Framebuffer)
    }

    /// Copy all three flags under one lock acquisition
    pub fn snapshot(&self) -> ConnectionSnapshot {
        *self.flags.lock()
    }
}
