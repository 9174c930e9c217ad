//! Shell transport trait

use async_trait::async_trait;
use std::time::Duration;

use crate::error::TransportError;
use crate::types::{CommandOutput, Credentials};

/// Authenticated remote shell session
#[async_trait]
pub trait ShellTransport: Send + Sync {
    /// Authenticate and run the device bring-up command
    ///
    /// Fails if authentication fails or the bring-up command exits with a
    /// non-zero status; the session is closed again in that case.
    async fn connect(
        &self,
        address: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<(), TransportError>;

    /// Run a command and collect its exit status and output
    async fn exec(&self, command: &str) -> Result<CommandOutput, TransportError>;

    /// Close the session. Idempotent.
    async fn disconnect(&self);

    /// Whether a session exists and its transport is still open
    async fn is_connected(&self) -> bool;
}
