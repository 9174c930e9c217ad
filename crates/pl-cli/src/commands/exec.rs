//! Exec command implementation

use anyhow::Result;
use std::io::Write;

use pl_core::config::PanelinkConfig;
use pl_core::{CommandOutput, TransportKind};

use crate::session::{DeviceArgs, DeviceSession};

/// Run one command over the device shell
///
/// Returns the remote exit status.
pub async fn exec_command(config: PanelinkConfig, args: &DeviceArgs, command: &str) -> Result<i32> {
    let mut session = DeviceSession::open(config, args)?;

    let result = exec(&mut session, command).await;
    session.close().await?;

    let output = result?;
    std::io::stdout().write_all(output.stdout.as_bytes())?;
    std::io::stderr().write_all(output.stderr.as_bytes())?;

    Ok(i32::try_from(output.exit_status).unwrap_or(i32::MAX))
}

async fn exec(session: &mut DeviceSession, command: &str) -> Result<CommandOutput> {
    session
        .connect(&[TransportKind::Socket, TransportKind::Shell])
        .await?;
    Ok(session.coordinator().run_shell_command(command).await?)
}
