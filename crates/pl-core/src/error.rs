//! Core error types for panelink

use pl_rfb::RfbError;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::TransportKind;

/// Top-level error type for the panelink ecosystem
#[derive(Error, Debug)]
pub enum PlError {
    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Coordinator error
    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a single transport handle
#[derive(Error, Debug)]
pub enum TransportError {
    /// Operation requires an open connection
    #[error("{0} is not connected")]
    NotConnected(TransportKind),

    /// Connect or I/O did not finish in time
    #[error("{kind} timed out")]
    Timeout { kind: TransportKind },

    /// Connection could not be established
    #[error("{kind} connection failed: {reason}")]
    ConnectFailed { kind: TransportKind, reason: String },

    /// Credentials were rejected
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// A remote command exited with a non-zero status
    #[error("Command '{command}' failed with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: u32,
        stderr: String,
    },

    /// SSH protocol error
    #[error("SSH error: {0}")]
    Ssh(String),

    /// Remote framebuffer protocol error
    #[error("Framebuffer protocol error: {0}")]
    Framebuffer(#[from] RfbError),

    /// Captured frame could not be encoded
    #[error("Image encoding failed: {0}")]
    Image(String),

    /// Request could not be turned into protocol messages
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while executing or submitting intents
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// Transport-level failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A prerequisite transport is not connected
    #[error("cannot connect {requested}: {required} is not connected")]
    PreconditionFailed {
        requested: TransportKind,
        required: TransportKind,
    },

    /// The worker has stopped (or never started) and dropped the request
    #[error("connection worker is not running")]
    WorkerStopped,

    /// An intent panicked while executing
    #[error("intent panicked: {0}")]
    IntentPanicked(String),

    /// The worker thread could not be spawned
    #[error("failed to spawn connection worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
