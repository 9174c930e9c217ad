//! SSH shell transport
//!
//! Opens a password-authenticated SSH session to the device and uses it
//! to (re)start the front-panel framebuffer server. The session stays
//! open so further commands can be run over it.

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use pl_core::config::DeviceConfig;
use pl_core::traits::ShellTransport;
use pl_core::{CommandOutput, Credentials, TransportError, TransportKind};

/// Extended-data stream number for stderr
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Upper bound for the best-effort teardown command on disconnect
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// SSH session to the device
pub struct SshShell {
    session: Mutex<Option<Handle<DeviceHandler>>>,
    port: u16,
    prepare: Option<String>,
    bring_up: String,
    teardown: Option<String>,
    command_timeout: Duration,
}

impl SshShell {
    /// Create a shell transport from device settings
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            session: Mutex::new(None),
            port: config.shell_port,
            prepare: config.commands.prepare().map(str::to_string),
            bring_up: config.bring_up_command(),
            teardown: config.commands.teardown().map(str::to_string),
            command_timeout: config.shell_timeout,
        }
    }

    async fn open(
        &self,
        address: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Handle<DeviceHandler>, TransportError> {
        let config = Arc::new(client::Config::default());

        tracing::debug!("Connecting to SSH at {}:{}", address, self.port);
        let mut handle = tokio::time::timeout(
            timeout,
            client::connect(config, (address, self.port), DeviceHandler),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            kind: TransportKind::Shell,
        })?
        .map_err(|e| TransportError::ConnectFailed {
            kind: TransportKind::Shell,
            reason: format!("{}:{}: {}", address, self.port, e),
        })?;

        tracing::debug!("Authenticating as user '{}'", credentials.username);
        let authenticated = tokio::time::timeout(
            timeout,
            handle.authenticate_password(
                credentials.username.clone(),
                credentials.password.clone(),
            ),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            kind: TransportKind::Shell,
        })?
        .map_err(ssh_error)?;

        if !authenticated {
            close_handle(&handle).await;
            return Err(TransportError::AuthenticationFailed);
        }

        Ok(handle)
    }

    /// Run prepare and bring-up on a fresh session
    async fn bring_up(&self, handle: &Handle<DeviceHandler>) -> Result<(), TransportError> {
        if let Some(prepare) = &self.prepare {
            match run_command(handle, prepare, self.command_timeout).await {
                Ok(output) => tracing::debug!(
                    "Prepare command exited with status {}",
                    output.exit_status
                ),
                Err(e) => tracing::warn!("Prepare command failed: {}", e),
            }
        }

        let output = run_command(handle, &self.bring_up, self.command_timeout).await?;
        if !output.success() {
            return Err(TransportError::CommandFailed {
                command: self.bring_up.clone(),
                status: output.exit_status,
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl ShellTransport for SshShell {
    async fn connect(
        &self,
        address: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        let mut guard = self.session.lock().await;
        if let Some(stale) = guard.take() {
            tracing::debug!("Closing stale SSH session before reconnecting");
            close_handle(&stale).await;
        }

        let handle = self.open(address, credentials, timeout).await?;
        if let Err(e) = self.bring_up(&handle).await {
            close_handle(&handle).await;
            return Err(e);
        }

        *guard = Some(handle);
        tracing::info!("Shell connected to {}", address);
        Ok(())
    }

    async fn exec(&self, command: &str) -> Result<CommandOutput, TransportError> {
        let guard = self.session.lock().await;
        let handle = guard
            .as_ref()
            .ok_or(TransportError::NotConnected(TransportKind::Shell))?;

        run_command(handle, command, self.command_timeout).await
    }

    async fn disconnect(&self) {
        let handle = self.session.lock().await.take();
        let Some(handle) = handle else {
            tracing::debug!("No SSH session to disconnect");
            return;
        };

        if let Some(teardown) = &self.teardown {
            if let Err(e) = run_command(&handle, teardown, TEARDOWN_TIMEOUT).await {
                tracing::debug!("Teardown command failed: {}", e);
            }
        }

        close_handle(&handle).await;
        tracing::info!("Shell disconnected");
    }

    async fn is_connected(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_closed())
    }
}

/// Run one command on its own channel and collect the result
async fn run_command(
    handle: &Handle<DeviceHandler>,
    command: &str,
    timeout: Duration,
) -> Result<CommandOutput, TransportError> {
    tracing::debug!("Running remote command: {}", command);

    let mut channel = handle.channel_open_session().await.map_err(ssh_error)?;
    channel.exec(true, command).await.map_err(ssh_error)?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    // A backgrounded process can keep the channel open after the shell
    // exits, so stop at the exit status instead of waiting for close.
    let collect = async {
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } if ext == SSH_EXTENDED_DATA_STDERR => {
                    stderr.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus { exit_status } => return Some(exit_status),
                _ => {}
            }
        }
        None
    };

    let status = tokio::time::timeout(timeout, collect)
        .await
        .map_err(|_| TransportError::Timeout {
            kind: TransportKind::Shell,
        })?;
    let _ = channel.close().await;

    let exit_status = status
        .ok_or_else(|| TransportError::Ssh(format!("'{}' ended without an exit status", command)))?;

    Ok(CommandOutput {
        exit_status,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

async fn close_handle(handle: &Handle<DeviceHandler>) {
    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, "closing", "en")
        .await
    {
        tracing::debug!("SSH disconnect: {}", e);
    }
}

fn ssh_error(e: russh::Error) -> TransportError {
    match e {
        russh::Error::NotAuthenticated => TransportError::AuthenticationFailed,
        other => TransportError::Ssh(other.to_string()),
    }
}

/// SSH client handler for the device
///
/// Devices regenerate their host key on reflash, so the key is logged and
/// accepted rather than pinned.
pub struct DeviceHandler;

#[async_trait]
impl client::Handler for DeviceHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!("Device host key: {}", server_public_key.fingerprint());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> SshShell {
        SshShell::from_config(&DeviceConfig {
            rotation: 90,
            ..Default::default()
        })
    }

    #[test]
    fn test_from_config_substitutes_rotation() {
        let shell = shell();
        assert_eq!(shell.port, 22);
        assert!(shell.bring_up.contains("-r 90"));
        assert_eq!(shell.teardown.as_deref(), Some("pkill remoteControlPanel"));
    }

    #[tokio::test]
    async fn test_exec_requires_session() {
        let shell = shell();
        assert!(!shell.is_connected().await);
        assert!(matches!(
            shell.exec("true").await,
            Err(TransportError::NotConnected(TransportKind::Shell))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_without_session_is_noop() {
        let shell = shell();
        shell.disconnect().await;
        shell.disconnect().await;
        assert!(!shell.is_connected().await);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let shell = SshShell::from_config(&DeviceConfig {
            shell_port: port,
            ..Default::default()
        });
        let result = shell
            .connect(
                "127.0.0.1",
                &Credentials::new("root", ""),
                Duration::from_secs(2),
            )
            .await;

        assert!(matches!(
            result,
            Err(TransportError::ConnectFailed { kind: TransportKind::Shell, .. })
        ));
        assert!(!shell.is_connected().await);
    }
}
