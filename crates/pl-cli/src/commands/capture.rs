//! Capture command implementation

use anyhow::{Context, Result};
use std::path::Path;

use pl_core::config::PanelinkConfig;
use pl_core::TransportKind;

use crate::output::{print_info, print_success};
use crate::session::{DeviceArgs, DeviceSession};

/// Connect every transport, save one frame as PNG, disconnect
pub async fn capture_command(config: PanelinkConfig, args: &DeviceArgs, output: &Path) -> Result<()> {
    let mut session = DeviceSession::open(config, args)?;
    print_info(&format!("Connecting to {}...", session.device().address));

    let result = capture(&mut session, output).await;
    session.close().await?;

    let size = result?;
    print_success(&format!("Saved {} ({} bytes)", output.display(), size));
    Ok(())
}

async fn capture(session: &mut DeviceSession, output: &Path) -> Result<usize> {
    session
        .connect(&[
            TransportKind::Socket,
            TransportKind::Shell,
            TransportKind::Framebuffer,
        ])
        .await?;

    let png = session
        .coordinator()
        .capture_frame()
        .await
        .context("Failed to capture frame")?;

    std::fs::write(output, &png)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(png.len())
}
