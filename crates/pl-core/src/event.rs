//! Connection events published by the coordinator

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::TransportKind;

/// A connection-state transition or failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConnectionEvent {
    SocketConnected,
    SocketDisconnected,
    ShellConnected,
    ShellDisconnected,
    FramebufferConnected,
    FramebufferDisconnected,
    /// Any failure inside the worker, already rendered for display
    ConnectionError { message: String },
}

impl ConnectionEvent {
    /// The "connected" event for a transport
    pub fn connected(kind: TransportKind) -> Self {
        match kind {
            TransportKind::Socket => Self::SocketConnected,
            TransportKind::Shell => Self::ShellConnected,
            TransportKind::Framebuffer => Self::FramebufferConnected,
        }
    }

    /// The "disconnected" event for a transport
    pub fn disconnected(kind: TransportKind) -> Self {
        match kind {
            TransportKind::Socket => Self::SocketDisconnected,
            TransportKind::Shell => Self::ShellDisconnected,
            TransportKind::Framebuffer => Self::FramebufferDisconnected,
        }
    }

    /// Build an error event from anything displayable
    pub fn error(message: impl fmt::Display) -> Self {
        Self::ConnectionError {
            message: message.to_string(),
        }
    }

    /// Transport this event concerns, if any
    pub fn transport(&self) -> Option<TransportKind> {
        match self {
            Self::SocketConnected | Self::SocketDisconnected => Some(TransportKind::Socket),
            Self::ShellConnected | Self::ShellDisconnected => Some(TransportKind::Shell),
            Self::FramebufferConnected | Self::FramebufferDisconnected => {
                Some(TransportKind::Framebuffer)
            }
            Self::ConnectionError { .. } => None,
        }
    }

    /// Whether this is a `ConnectionError`
    pub fn is_error(&self) -> bool {
        matches!(self, Self::ConnectionError { .. })
    }
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionError { message } => write!(f, "connection error: {}", message),
            other => {
                let kind = other.transport().map(|k| k.as_str()).unwrap_or_default();
                let verb = match other {
                    Self::SocketConnected | Self::ShellConnected | Self::FramebufferConnected => {
                        "connected"
                    }
                    _ => "disconnected",
                };
                write!(f, "{} {}", kind, verb)
            }
        }
    }
}
