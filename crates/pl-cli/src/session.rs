//! A coordinator wired to one device, as used by the commands

use anyhow::{bail, Result};
use clap::Args;
use std::sync::Arc;
use tokio::sync::mpsc;

use pl_coordinator::{ChannelListener, ConnectTimeouts, ConnectionCoordinator, ConnectionListener};
use pl_core::config::{DeviceConfig, PanelinkConfig};
use pl_core::{ConnectionEvent, TransportKind};
use pl_transport::device_transports;

/// Device selection and credentials shared by the device commands
#[derive(Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    /// Device address (overrides config)
    #[arg(short, long)]
    pub address: Option<String>,

    /// Shell username (overrides config)
    #[arg(short, long)]
    pub username: Option<String>,

    /// Shell password (overrides config)
    #[arg(long, env = "PANELINK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl DeviceArgs {
    /// Apply the overrides to the configured device
    pub fn resolve(&self, mut device: DeviceConfig) -> Result<DeviceConfig> {
        if let Some(address) = &self.address {
            device.address = address.clone();
        }
        if let Some(username) = &self.username {
            device.username = username.clone();
        }
        if let Some(password) = &self.password {
            device.password = password.clone();
        }

        if device.address.trim().is_empty() {
            bail!("no device address: pass --address or set device.address in the config");
        }
        Ok(device)
    }
}

/// Running coordinator plus the events it has published
pub struct DeviceSession {
    coordinator: ConnectionCoordinator,
    device: DeviceConfig,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    _listener: Arc<dyn ConnectionListener>,
}

impl DeviceSession {
    /// Build the transports and start the worker
    pub fn open(config: PanelinkConfig, args: &DeviceArgs) -> Result<Self> {
        let device = args.resolve(config.device)?;

        let coordinator =
            ConnectionCoordinator::new(device_transports(&device), config.coordinator)
                .with_timeouts(ConnectTimeouts::from(&device));

        let (listener, events) = ChannelListener::channel();
        let listener: Arc<dyn ConnectionListener> = listener;
        coordinator.add_listener(&listener);
        coordinator.start_worker()?;

        Ok(Self {
            coordinator,
            device,
            events,
            _listener: listener,
        })
    }

    pub fn coordinator(&self) -> &ConnectionCoordinator {
        &self.coordinator
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }

    /// Next published event; `None` once the worker is gone
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.events.recv().await
    }

    /// Events already published, without waiting
    pub fn drain_events(&mut self) -> Vec<ConnectionEvent> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }

    /// Connect the given transports in order and wait for the outcome
    ///
    /// Returns the events published along the way. Fails if any of them
    /// is not connected afterwards.
    pub async fn connect(&mut self, kinds: &[TransportKind]) -> Result<Vec<ConnectionEvent>> {
        let device = &self.device;
        for kind in kinds {
            tracing::debug!("Connecting {} on {}", kind, device.address);
            match kind {
                TransportKind::Socket => self
                    .coordinator
                    .connect_socket(&device.address, device.socket_port),
                TransportKind::Shell => self
                    .coordinator
                    .connect_shell(&device.address, device.credentials()),
                TransportKind::Framebuffer => self
                    .coordinator
                    .connect_framebuffer(&device.address, device.framebuffer_port),
            }
        }
        self.coordinator.flush().await?;

        let events = self.drain_events();

        let snapshot = self.coordinator.snapshot();
        if let Some(missing) = kinds.iter().find(|kind| !snapshot.get(**kind)) {
            let reasons: Vec<String> = events
                .iter()
                .filter_map(|event| match event {
                    ConnectionEvent::ConnectionError { message } => Some(message.clone()),
                    _ => None,
                })
                .collect();
            bail!("{} did not connect: {}", missing, reasons.join("; "));
        }

        Ok(events)
    }

    /// Tear everything down and stop the worker
    pub async fn close(self) -> Result<()> {
        self.coordinator.disconnect_all();
        let flushed = self.coordinator.flush().await;
        self.coordinator.stop();
        flushed?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_overrides() {
        let args = DeviceArgs {
            address: Some("10.0.0.7".to_string()),
            username: None,
            password: Some("pw".to_string()),
        };
        let device = args.resolve(DeviceConfig::default()).unwrap();
        assert_eq!(device.address, "10.0.0.7");
        assert_eq!(device.username, "root");
        assert_eq!(device.password, "pw");
    }

    #[test]
    fn test_resolve_requires_address() {
        let err = DeviceArgs::default()
            .resolve(DeviceConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("no device address"));
    }
}
