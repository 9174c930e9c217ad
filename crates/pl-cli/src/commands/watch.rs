//! Watch command implementation

use anyhow::Result;

use pl_core::config::PanelinkConfig;

use crate::output::{format_event, print_info};
use crate::session::{DeviceArgs, DeviceSession};

/// Connect everything and print connection events until Ctrl+C
pub async fn watch_command(config: PanelinkConfig, args: &DeviceArgs, json: bool) -> Result<()> {
    let mut session = DeviceSession::open(config, args)?;
    if !json {
        print_info(&format!(
            "Watching {} (Ctrl+C to stop)",
            session.device().address
        ));
    }

    let coordinator = session.coordinator();
    let device = session.device();
    coordinator.connect_socket(&device.address, device.socket_port);
    coordinator.connect_shell(&device.address, device.credentials());
    coordinator.connect_framebuffer(&device.address, device.framebuffer_port);

    loop {
        tokio::select! {
            event = session.next_event() => match event {
                Some(event) => println!("{}", format_event(&event, json)),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("Interrupted");
                break;
            }
        }
    }

    // Show the teardown events too
    session.coordinator().disconnect_all();
    session.coordinator().flush().await?;
    for event in session.drain_events() {
        println!("{}", format_event(&event, json));
    }

    session.close().await
}
