//! Device connection settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::types::Credentials;

/// Placeholder substituted with [`DeviceConfig::rotation`] in shell commands
pub const ROTATION_PLACEHOLDER: &str = "{rotation}";

/// How to reach the device and bring up its framebuffer server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device IP address or hostname
    pub address: String,

    /// Port for the raw socket transport
    pub socket_port: u16,

    /// Port for the shell (SSH) transport
    pub shell_port: u16,

    /// Port the framebuffer server listens on
    pub framebuffer_port: u16,

    /// Shell username
    pub username: String,

    /// Shell password
    pub password: String,

    /// Panel rotation in degrees, passed to the framebuffer server
    pub rotation: u16,

    /// Socket connect timeout
    #[serde(with = "duration_secs")]
    pub socket_timeout: Duration,

    /// Shell connect/auth timeout
    #[serde(with = "duration_secs")]
    pub shell_timeout: Duration,

    /// Framebuffer connect and refresh timeout
    #[serde(with = "duration_secs")]
    pub framebuffer_timeout: Duration,

    /// Commands run over the shell around the framebuffer server lifetime
    pub commands: ShellCommands,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            socket_port: 80,
            shell_port: 22,
            framebuffer_port: 5900,
            username: "root".to_string(),
            password: String::new(),
            rotation: 0,
            socket_timeout: Duration::from_secs(2),
            shell_timeout: Duration::from_secs(5),
            framebuffer_timeout: Duration::from_secs(5),
            commands: ShellCommands::default(),
        }
    }
}

impl DeviceConfig {
    /// Shell credentials
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    /// Bring-up command with the rotation substituted
    pub fn bring_up_command(&self) -> String {
        self.commands
            .bring_up
            .replace(ROTATION_PLACEHOLDER, &self.rotation.to_string())
    }
}

/// Shell commands that manage the framebuffer server on the device
///
/// An empty `prepare` or `teardown` turns that step off. A key left out
/// of the file keeps its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellCommands {
    /// Run before bring-up; exit status ignored (e.g. kill a stale server)
    pub prepare: String,

    /// Starts the framebuffer server; must exit 0
    pub bring_up: String,

    /// Run best-effort before the shell session closes
    pub teardown: String,
}

impl ShellCommands {
    /// The prepare command, unless disabled
    pub fn prepare(&self) -> Option<&str> {
        non_empty(&self.prepare)
    }

    /// The teardown command, unless disabled
    pub fn teardown(&self) -> Option<&str> {
        non_empty(&self.teardown)
    }
}

fn non_empty(command: &str) -> Option<&str> {
    let command = command.trim();
    (!command.is_empty()).then_some(command)
}

impl Default for ShellCommands {
    fn default() -> Self {
        Self {
            prepare: "pkill remoteControlPanel".to_string(),
            bring_up: "cd /core/bin && ./remoteControlPanel -r {rotation} -t /dev/input/event0 &"
                .to_string(),
            teardown: "pkill remoteControlPanel".to_string(),
        }
    }
}
