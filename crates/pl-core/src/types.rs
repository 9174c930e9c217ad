//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three transports held open to a device
///
/// Declared in dependency order: the framebuffer needs the shell (which
/// starts the framebuffer server on the device) and both ride on the
/// device being reachable over the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Raw TCP socket, used as the reachability channel
    Socket,
    /// Remote shell (SSH) session
    Shell,
    /// Remote framebuffer (RFB) session
    Framebuffer,
}

impl TransportKind {
    /// All kinds, in teardown order (dependents first)
    pub const TEARDOWN_ORDER: [TransportKind; 3] = [
        TransportKind::Framebuffer,
        TransportKind::Shell,
        TransportKind::Socket,
    ];

    /// Lower-case name used in logs and messages
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Socket => "socket",
            TransportKind::Shell => "shell",
            TransportKind::Framebuffer => "framebuffer",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Username/password pair for the shell transport
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Create a credential pair
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of a command executed over the shell transport
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit status reported by the remote side
    pub exit_status: u32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// Outcome of an active liveness probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// The peer answered
    Alive,
    /// No answer in time; the link may still be up
    Inconclusive,
    /// Hard error or end of stream
    Dead,
}
