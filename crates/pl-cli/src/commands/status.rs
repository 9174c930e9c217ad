//! Status command implementation

use anyhow::Result;

use pl_core::config::PanelinkConfig;
use pl_core::TransportKind;

use crate::output::{format_snapshot, print_warning};
use crate::session::{DeviceArgs, DeviceSession};

/// Try to bring every transport up and report which ones made it
pub async fn status_command(config: PanelinkConfig, args: &DeviceArgs, json: bool) -> Result<()> {
    let mut session = DeviceSession::open(config, args)?;

    if let Err(e) = session
        .connect(&[
            TransportKind::Socket,
            TransportKind::Shell,
            TransportKind::Framebuffer,
        ])
        .await
    {
        print_warning(&e.to_string());
    }

    let snapshot = session.coordinator().snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("{}", format_snapshot(&session.device().address, &snapshot));
    }

    session.close().await
}
