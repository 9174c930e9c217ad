//! Coordinator and watchdog settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::{duration_millis, duration_secs};

/// Behaviour of the connection worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// How long `stop()` waits for the worker thread to finish
    #[serde(with = "duration_millis")]
    pub join_timeout: Duration,

    /// Refuse `connect_shell` while the socket is down
    ///
    /// Off by default: callers historically connect the shell on its own.
    pub require_socket_for_shell: bool,

    /// Socket liveness checks
    pub watchdog: WatchdogConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(2),
            require_socket_for_shell: false,
            watchdog: WatchdogConfig::default(),
        }
    }
}

/// Periodic socket liveness checking
///
/// The passive check peeks at the socket and never writes to it. The
/// heartbeat writes a probe byte; some devices reset the connection when
/// they receive unexpected bytes, so it stays off unless tuned against
/// the actual hardware.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Run the watchdog while the worker is running
    pub enabled: bool,

    /// Time between checks
    #[serde(with = "duration_secs")]
    pub interval: Duration,

    /// Also send an active one-byte probe
    pub heartbeat: bool,

    /// How long to wait for the probe reply
    #[serde(with = "duration_millis")]
    pub heartbeat_timeout: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(5),
            heartbeat: false,
            heartbeat_timeout: Duration::from_millis(1000),
        }
    }
}
