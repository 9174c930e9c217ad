//! Socket liveness monitoring
//!
//! The watchdog never touches the socket itself. It only queues a
//! `CheckSocket` intent on every tick so the check runs on the worker,
//! in order with every other connection operation.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use pl_core::config::WatchdogConfig;
use pl_core::traits::SocketTransport;
use pl_core::Liveness;

use crate::intent::Intent;
use crate::state::ConnectionState;

/// Periodically queues socket liveness checks
pub(crate) struct SocketWatchdog {
    interval: Duration,
}

impl SocketWatchdog {
    pub(crate) fn new(config: &WatchdogConfig) -> Self {
        // tokio rejects a zero period
        Self {
            interval: config.interval.max(Duration::from_millis(100)),
        }
    }

    /// Start ticking on the current runtime until `cancel` fires
    pub(crate) fn spawn(
        &self,
        state: Arc<ConnectionState>,
        intents: mpsc::UnboundedSender<Intent>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let interval = self.interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            tracing::debug!("Socket watchdog running every {:?}", interval);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if !state.is_socket_connected() {
                            continue;
                        }
                        if intents.send(Intent::CheckSocket).is_err() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("Socket watchdog stopped");
        })
    }
}

/// Decide whether the socket is still usable
///
/// With the heartbeat off this is the passive peek. With it on, only a
/// definite `Dead` probe result counts as lost.
pub(crate) async fn socket_alive(socket: &dyn SocketTransport, config: &WatchdogConfig) -> bool {
    if !config.heartbeat {
        return socket.is_connected().await;
    }

    match socket.probe(config.heartbeat_timeout).await {
        Liveness::Alive => true,
        Liveness::Inconclusive => {
            tracing::debug!("Heartbeat inconclusive, keeping socket");
            true
        }
        Liveness::Dead => false,
    }
}
